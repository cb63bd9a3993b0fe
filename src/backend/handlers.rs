//! Request Handlers
//!
//! One function per inbound operation, entered from the FIFO worker. A
//! handler runs to completion, nested round trips included, before the
//! next envelope is dequeued.

use std::sync::Arc;

use anyhow::Context;
use serde_json::{from_value, json, Value};

use super::protocol::{
    AddLogData, BrowseViewIndexData, BrowseViewPageData, BrowseViewPageResponse, GameIdData,
    OpenDialogData, QuickSearchData, RandomGamesData, Request, RequestType, ResponseType,
    SelectViewPlaylistData, SetViewOrderData, SetViewTextData, ViewData,
};
use super::server::{push_log, request_client, respond};
use super::state::BackState;

pub async fn handle_request(
    state: &Arc<BackState>,
    connection: u64,
    request: Request,
) -> anyhow::Result<()> {
    match request.kind {
        RequestType::AddLog => {
            let data: AddLogData = from_value(request.data).context("AddLog data")?;
            push_log(state, data.source, data.content);
        }

        RequestType::GetInitData => {
            let config = state.config.read().clone();
            respond(
                state,
                connection,
                &request.id,
                ResponseType::GenericResponse,
                json!({
                    "config": config,
                    "fileServerPort": state.file_server_port(),
                    "log": state.log_snapshot(),
                    "playlists": state.playlists.all(),
                    "platforms": state.collection.platforms(),
                    "total": state.collection.count(),
                }),
            );
        }

        RequestType::GetGamesTotal => {
            respond(
                state,
                connection,
                &request.id,
                ResponseType::GenericResponse,
                json!(state.collection.count()),
            );
        }

        RequestType::GetGame => {
            let data: GameIdData = from_value(request.data).context("GetGame data")?;
            respond(
                state,
                connection,
                &request.id,
                ResponseType::GenericResponse,
                json!({ "game": state.collection.find_game(&data.id) }),
            );
        }

        RequestType::GetAllGames => {
            respond(
                state,
                connection,
                &request.id,
                ResponseType::GenericResponse,
                json!({ "games": state.collection.games() }),
            );
        }

        RequestType::RandomGames => {
            let data: RandomGamesData = from_value(request.data).context("RandomGames data")?;
            respond(
                state,
                connection,
                &request.id,
                ResponseType::GenericResponse,
                json!(state.collection.random_games(data.count)),
            );
        }

        RequestType::BrowseViewPage => {
            let data: BrowseViewPageData = from_value(request.data).context("BrowseViewPage data")?;
            let results = state.query_games(&data.query);
            let games: Vec<_> = results
                .games
                .iter()
                .skip(data.offset)
                .take(data.limit)
                .cloned()
                .collect();
            let response = BrowseViewPageResponse {
                games,
                offset: data.offset,
                total: results.games.len(),
            };
            respond(
                state,
                connection,
                &request.id,
                ResponseType::GenericResponse,
                serde_json::to_value(response)?,
            );
        }

        RequestType::BrowseViewIndex => {
            let data: BrowseViewIndexData =
                from_value(request.data).context("BrowseViewIndex data")?;
            let results = state.query_games(&data.query);
            let index = results
                .games
                .iter()
                .position(|game| game.id == data.game_id)
                .map(|index| index as i64)
                .unwrap_or(-1);
            respond(
                state,
                connection,
                &request.id,
                ResponseType::GenericResponse,
                json!({ "index": index }),
            );
        }

        RequestType::QuickSearch => {
            let data: QuickSearchData = from_value(request.data).context("QuickSearch data")?;
            let results = state.query_games(&data.query);
            let prefix = data.search.to_lowercase();
            let found = results
                .games
                .iter()
                .enumerate()
                .find(|(_, game)| game.title.to_lowercase().starts_with(&prefix));
            respond(
                state,
                connection,
                &request.id,
                ResponseType::GenericResponse,
                json!({
                    "id": found.map(|(_, game)| game.id.clone()),
                    "index": found.map(|(index, _)| index),
                }),
            );
        }

        RequestType::GetPlaylists => {
            respond(
                state,
                connection,
                &request.id,
                ResponseType::GenericResponse,
                json!(state.playlists.all()),
            );
        }

        RequestType::LaunchGame => {
            let data: GameIdData = from_value(request.data).context("LaunchGame data")?;
            match state.collection.find_game(&data.id) {
                Some(game) => {
                    if let Err(failure) = state.launcher.launch(game) {
                        push_log(
                            state,
                            "Launcher",
                            format!("Failed to launch \"{}\": {failure:#}", game.title),
                        );
                        // Tell the requesting client; its acknowledgement
                        // comes back through the pending map while this
                        // handler still blocks the worker.
                        let dialog = OpenDialogData {
                            title: "Launch failed".to_string(),
                            message: format!("Could not launch \"{}\": {failure}", game.title),
                        };
                        let _ = request_client(
                            state,
                            connection,
                            ResponseType::OpenDialog,
                            serde_json::to_value(dialog)?,
                        )
                        .await;
                    }
                }
                None => push_log(
                    state,
                    "Launcher",
                    format!("Cannot launch game: id \"{}\" not found", data.id),
                ),
            }
            respond(
                state,
                connection,
                &request.id,
                ResponseType::GenericResponse,
                Value::Null,
            );
        }

        RequestType::UpdateConfig => {
            let mut merged = serde_json::to_value(&*state.config.read())?;
            merge_json(&mut merged, &request.data);
            let updated: crate::config::AppConfig =
                from_value(merged).context("UpdateConfig data")?;
            if let Err(failure) = updated.save(&state.config_path) {
                push_log(state, "Backend", format!("Failed to save config: {failure:#}"));
            }
            *state.config.write() = updated;
            respond(
                state,
                connection,
                &request.id,
                ResponseType::GenericResponse,
                Value::Null,
            );
        }

        RequestType::SetViewText => {
            let data: SetViewTextData = from_value(request.data).context("SetViewText data")?;
            state.views.set_text(&data.view, data.text);
        }

        RequestType::SelectViewPlaylist => {
            let data: SelectViewPlaylistData =
                from_value(request.data).context("SelectViewPlaylist data")?;
            state.views.select_playlist(&data.view, data.playlist_id);
        }

        RequestType::SetViewOrder => {
            let data: SetViewOrderData = from_value(request.data).context("SetViewOrder data")?;
            state
                .views
                .set_order(&data.view, data.order_by, data.order_reverse);
        }

        RequestType::GetViewGames => {
            let data: ViewData = from_value(request.data).context("GetViewGames data")?;
            let payload = match state.views.view_games(&data.view) {
                Some((games, generation)) => json!({
                    "view": data.view,
                    "games": games,
                    "generation": generation,
                }),
                None => Value::Null,
            };
            respond(
                state,
                connection,
                &request.id,
                ResponseType::GenericResponse,
                payload,
            );
        }

        RequestType::CloseView => {
            let data: ViewData = from_value(request.data).context("CloseView data")?;
            state.views.close_view(&data.view);
        }

        RequestType::Quit => {
            respond(state, connection, &request.id, ResponseType::Quit, Value::Null);
            state.request_shutdown();
        }

        // Never queued; the connection reader resolves these directly.
        RequestType::GenericResponse => {}
    }

    Ok(())
}

/// Recursively overlay `patch` onto `base`: objects merge key by key,
/// anything else replaces the existing value.
fn merge_json(base: &mut Value, patch: &Value) {
    if let (Value::Object(base_map), Value::Object(patch_map)) = (base, patch) {
        for (key, value) in patch_map {
            match base_map.get_mut(key) {
                Some(slot) if slot.is_object() && value.is_object() => merge_json(slot, value),
                _ => {
                    base_map.insert(key.clone(), value.clone());
                }
            }
        }
    }
}
