//! Message Envelope
//!
//! Every message on the wire is one JSON envelope `{id, type, data}`, in
//! both directions. `id` is a client-generated correlation token; `type` is
//! an integer from one of the two enums below, depending on direction.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::game::GameRecord;
use crate::search::{GameOrderBy, GameOrderDirection};

/// Reply sent after a successful secret exchange.
pub const AUTH_ACK: &str = "auth successful";

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown request type {0}")]
    UnknownRequestType(u32),
    #[error("unknown response type {0}")]
    UnknownResponseType(u32),
}

/// Inbound message types (client → backend).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub enum RequestType {
    AddLog = 0,
    GetInitData = 1,
    GetGamesTotal = 2,
    GetGame = 3,
    GetAllGames = 4,
    RandomGames = 5,
    BrowseViewPage = 6,
    BrowseViewIndex = 7,
    QuickSearch = 8,
    GetPlaylists = 9,
    LaunchGame = 10,
    UpdateConfig = 11,
    SetViewText = 12,
    SelectViewPlaylist = 13,
    SetViewOrder = 14,
    GetViewGames = 15,
    CloseView = 16,
    Quit = 17,
    /// Marks the envelope as the answer to a backend-originated request; it
    /// bypasses the dispatch queue and resolves the pending handle directly.
    GenericResponse = 18,
}

impl From<RequestType> for u32 {
    fn from(value: RequestType) -> Self {
        value as u32
    }
}

impl TryFrom<u32> for RequestType {
    type Error = ProtocolError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::AddLog,
            1 => Self::GetInitData,
            2 => Self::GetGamesTotal,
            3 => Self::GetGame,
            4 => Self::GetAllGames,
            5 => Self::RandomGames,
            6 => Self::BrowseViewPage,
            7 => Self::BrowseViewIndex,
            8 => Self::QuickSearch,
            9 => Self::GetPlaylists,
            10 => Self::LaunchGame,
            11 => Self::UpdateConfig,
            12 => Self::SetViewText,
            13 => Self::SelectViewPlaylist,
            14 => Self::SetViewOrder,
            15 => Self::GetViewGames,
            16 => Self::CloseView,
            17 => Self::Quit,
            18 => Self::GenericResponse,
            other => return Err(ProtocolError::UnknownRequestType(other)),
        })
    }
}

/// Outbound message types (backend → client), responses and broadcasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub enum ResponseType {
    GenericResponse = 0,
    LogEntryAdded = 1,
    PlaylistUpdate = 2,
    ViewGamesUpdate = 3,
    /// Backend-originated request: show a dialog and answer with a
    /// `GenericResponse` envelope carrying the same id.
    OpenDialog = 4,
    Quit = 5,
}

impl From<ResponseType> for u32 {
    fn from(value: ResponseType) -> Self {
        value as u32
    }
}

impl TryFrom<u32> for ResponseType {
    type Error = ProtocolError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::GenericResponse,
            1 => Self::LogEntryAdded,
            2 => Self::PlaylistUpdate,
            3 => Self::ViewGamesUpdate,
            4 => Self::OpenDialog,
            5 => Self::Quit,
            other => return Err(ProtocolError::UnknownResponseType(other)),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: RequestType,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ResponseType,
    #[serde(default)]
    pub data: Value,
}

/// Parse an inbound envelope. The caller logs and drops failures; no error
/// envelope is sent back.
pub fn parse_request(text: &str) -> Result<Request, serde_json::Error> {
    serde_json::from_str(text)
}

// === Request payloads ===

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddLogData {
    pub source: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameIdData {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomGamesData {
    pub count: usize,
}

/// A stateless query: everything needed to produce an ordered result list.
/// Also the cache key for repeated browse requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchQuery {
    pub search: String,
    pub order_by: GameOrderBy,
    pub order_reverse: GameOrderDirection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playlist_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowseViewPageData {
    pub query: SearchQuery,
    pub offset: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowseViewIndexData {
    pub query: SearchQuery,
    pub game_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickSearchData {
    pub query: SearchQuery,
    /// Title prefix to look for within the query's results.
    pub search: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetViewTextData {
    pub view: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectViewPlaylistData {
    pub view: String,
    #[serde(default)]
    pub playlist_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetViewOrderData {
    pub view: String,
    pub order_by: GameOrderBy,
    pub order_reverse: GameOrderDirection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewData {
    pub view: String,
}

// === Response payloads ===

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowseViewPageResponse {
    pub games: Vec<GameRecord>,
    pub offset: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenDialogData {
    pub title: String,
    pub message: String,
}
