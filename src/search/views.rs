//! Results Views
//!
//! Per-context browsing state: search text, active filter, order, committed
//! result list. Edits schedule a debounced evaluation; a per-view generation
//! counter makes "latest wins" structural, so an evaluation that finishes
//! out of order is discarded instead of clobbering newer results.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use log::debug;
use parking_lot::Mutex;

use crate::game::{playlist, GameCollection, GameRecord, PlaylistRegistry};

use super::{
    build_search_filter, filter_game_refs,
    order::{order_games, GameOrderBy, GameOrderDirection},
    GameFilter,
};

/// Quiet interval between an input edit and the evaluation it schedules.
/// Rapid successive edits collapse into a single evaluation.
const SEARCH_DEBOUNCE: Duration = Duration::from_millis(125);

/// One browsing context's search state.
pub struct ResultsView {
    pub text: String,
    pub filter: GameFilter,
    pub order_by: GameOrderBy,
    pub order_direction: GameOrderDirection,
    /// The committed result list of the most recent evaluation.
    pub games: Vec<GameRecord>,
    pub selected_game: Option<String>,
    pub selected_playlist: Option<String>,
    /// Bumped on every dispatch; evaluations carrying a stale value are
    /// discarded at commit time.
    pub generation: u64,
}

impl ResultsView {
    fn new() -> Self {
        Self {
            text: String::new(),
            filter: GameFilter::empty_leaf(),
            order_by: GameOrderBy::Title,
            order_direction: GameOrderDirection::Ascending,
            games: Vec::new(),
            selected_game: None,
            selected_playlist: None,
            generation: 0,
        }
    }
}

type CommitHook = dyn Fn(&str, usize, u64) + Send + Sync;

/// Owns every open [`ResultsView`], keyed by view name (one per platform
/// browsing context), and runs their debounced searches.
pub struct ViewManager {
    collection: Arc<GameCollection>,
    playlists: Arc<PlaylistRegistry>,
    views: Mutex<HashMap<String, ResultsView>>,
    on_commit: Mutex<Option<Arc<CommitHook>>>,
    /// Handle to ourselves for the debounce tasks we spawn.
    me: Weak<ViewManager>,
}

impl ViewManager {
    pub fn new(collection: Arc<GameCollection>, playlists: Arc<PlaylistRegistry>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            collection,
            playlists,
            views: Mutex::new(HashMap::new()),
            on_commit: Mutex::new(None),
            me: me.clone(),
        })
    }

    /// Install a hook invoked with (view, total, generation) after each
    /// commit. The backend uses this to announce view updates.
    pub fn set_commit_hook(&self, hook: Arc<CommitHook>) {
        *self.on_commit.lock() = Some(hook);
    }

    pub fn open_view(&self, name: &str) {
        self.views
            .lock()
            .entry(name.to_string())
            .or_insert_with(ResultsView::new);
    }

    pub fn close_view(&self, name: &str) {
        self.views.lock().remove(name);
    }

    /// Committed result list and generation, if the view is open.
    pub fn view_games(&self, name: &str) -> Option<(Vec<GameRecord>, u64)> {
        let views = self.views.lock();
        views
            .get(name)
            .map(|view| (view.games.clone(), view.generation))
    }

    pub fn select_game(&self, name: &str, game_id: Option<String>) {
        if let Some(view) = self.views.lock().get_mut(name) {
            view.selected_game = game_id;
        }
    }

    pub fn selected_game(&self, name: &str) -> Option<String> {
        self.views
            .lock()
            .get(name)
            .and_then(|view| view.selected_game.clone())
    }

    pub fn set_text(&self, name: &str, text: String) {
        {
            let mut views = self.views.lock();
            let view = views.entry(name.to_string()).or_insert_with(ResultsView::new);
            view.text = text;
        }
        self.schedule(name);
    }

    pub fn select_playlist(&self, name: &str, playlist_id: Option<String>) {
        {
            let mut views = self.views.lock();
            let view = views.entry(name.to_string()).or_insert_with(ResultsView::new);
            view.selected_playlist = playlist_id;
        }
        self.schedule(name);
    }

    /// Changing the order re-sorts the committed list immediately; no
    /// re-evaluation is needed.
    pub fn set_order(&self, name: &str, order_by: GameOrderBy, direction: GameOrderDirection) {
        if let Some(view) = self.views.lock().get_mut(name) {
            view.order_by = order_by;
            view.order_direction = direction;
            order_games(&mut view.games, order_by, direction);
        }
    }

    /// Bump the view's generation and schedule an evaluation after the quiet
    /// interval. Whichever dispatch carries the newest generation wins.
    fn schedule(&self, name: &str) {
        let generation = {
            let mut views = self.views.lock();
            let Some(view) = views.get_mut(name) else {
                return;
            };
            view.generation += 1;
            view.generation
        };
        let Some(manager) = self.me.upgrade() else {
            return;
        };
        let name = name.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(SEARCH_DEBOUNCE).await;
            manager.run_search(&name, generation);
        });
    }

    /// Evaluate the view's *current* inputs and commit the result, unless a
    /// newer dispatch has superseded this one.
    pub fn run_search(&self, name: &str, generation: u64) {
        let (text, playlist_id, order_by, order_direction) = {
            let views = self.views.lock();
            let Some(view) = views.get(name) else {
                return;
            };
            if view.generation != generation {
                return;
            }
            (
                view.text.clone(),
                view.selected_playlist.clone(),
                view.order_by,
                view.order_direction,
            )
        };

        let playlist = playlist_id.as_deref().and_then(|id| self.playlists.find(id));
        let filter = build_search_filter(&text, playlist.as_ref().and_then(|p| p.filter.as_ref()));

        let all = self.collection.games();
        let base: Vec<&GameRecord> = match &playlist {
            Some(playlist) => playlist::filter_playlist(playlist, all),
            // Without a playlist the view name is the platform it browses.
            None => all.iter().filter(|game| game.platform == name).collect(),
        };

        let mut result: Vec<GameRecord> = filter_game_refs(&base, &filter)
            .into_iter()
            .cloned()
            .collect();
        order_games(&mut result, order_by, order_direction);

        let total = result.len();
        {
            let mut views = self.views.lock();
            let Some(view) = views.get_mut(name) else {
                return;
            };
            if view.generation != generation {
                debug!(
                    "Discarding stale search for view {name} \
                     (generation {generation}, current {})",
                    view.generation
                );
                return;
            }
            view.filter = filter;
            view.games = result;
        }

        let hook = self.on_commit.lock().clone();
        if let Some(hook) = hook {
            hook(name, total, generation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{GamePlaylist, PlaylistEntry};

    fn game(id: &str, title: &str, platform: &str) -> GameRecord {
        GameRecord {
            id: id.to_string(),
            title: title.to_string(),
            platform: platform.to_string(),
            ..GameRecord::default()
        }
    }

    fn manager(games: Vec<GameRecord>) -> Arc<ViewManager> {
        ViewManager::new(
            Arc::new(GameCollection::new(games)),
            Arc::new(PlaylistRegistry::new()),
        )
    }

    fn committed_titles(manager: &ViewManager, view: &str) -> Vec<String> {
        manager
            .view_games(view)
            .map(|(games, _)| games.into_iter().map(|g| g.title).collect())
            .unwrap_or_default()
    }

    #[test]
    fn stale_generations_are_discarded() {
        // Drive run_search directly to model out-of-order completion: the
        // older dispatch finishes after the newer one.
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let _guard = runtime.enter();

        let manager = manager(vec![
            game("1", "Alpha", "MS-DOS"),
            game("2", "Beta", "MS-DOS"),
        ]);
        manager.open_view("MS-DOS");
        manager.set_text("MS-DOS", "alpha".to_string()); // generation 1
        manager.set_text("MS-DOS", "beta".to_string()); // generation 2

        manager.run_search("MS-DOS", 2);
        assert_eq!(committed_titles(&manager, "MS-DOS"), vec!["Beta"]);

        // The superseded evaluation completes late and must not commit.
        manager.run_search("MS-DOS", 1);
        assert_eq!(committed_titles(&manager, "MS-DOS"), vec!["Beta"]);
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_edits_collapse_into_one_commit() {
        let manager = manager(vec![
            game("1", "Alpha", "MS-DOS"),
            game("2", "Beta", "MS-DOS"),
        ]);
        let commits: Arc<Mutex<Vec<(String, usize, u64)>>> = Arc::new(Mutex::new(Vec::new()));
        {
            let commits = Arc::clone(&commits);
            manager.set_commit_hook(Arc::new(move |view, total, generation| {
                commits.lock().push((view.to_string(), total, generation));
            }));
        }

        manager.open_view("MS-DOS");
        manager.set_text("MS-DOS", "alpha".to_string());
        manager.set_text("MS-DOS", "beta".to_string());

        // Let both debounce timers fire.
        tokio::time::sleep(Duration::from_millis(500)).await;

        let commits = commits.lock().clone();
        assert_eq!(commits, vec![("MS-DOS".to_string(), 1, 2)]);
        assert_eq!(committed_titles(&manager, "MS-DOS"), vec!["Beta"]);
    }

    #[tokio::test(start_paused = true)]
    async fn playlist_selection_restricts_and_reorders() {
        let collection = Arc::new(GameCollection::new(vec![
            game("1", "Alpha", "MS-DOS"),
            game("2", "Beta", "MS-DOS"),
            game("3", "Gamma", "MS-DOS"),
        ]));
        let playlists = Arc::new(PlaylistRegistry::new());
        playlists.upsert(GamePlaylist {
            filename: "favs.json".to_string(),
            games: vec![
                PlaylistEntry { id: "3".into(), ..Default::default() },
                PlaylistEntry { id: "1".into(), ..Default::default() },
            ],
            ..Default::default()
        });
        let manager = ViewManager::new(collection, playlists);

        manager.open_view("MS-DOS");
        manager.select_playlist("MS-DOS", Some("favs.json".to_string()));
        tokio::time::sleep(Duration::from_millis(500)).await;

        // Title ordering applies on top of the playlist restriction.
        assert_eq!(committed_titles(&manager, "MS-DOS"), vec!["Alpha", "Gamma"]);
    }

    #[tokio::test(start_paused = true)]
    async fn order_changes_resort_without_reevaluating() {
        let manager = manager(vec![
            game("1", "Alpha", "MS-DOS"),
            game("2", "Beta", "MS-DOS"),
        ]);
        manager.open_view("MS-DOS");
        manager.set_text("MS-DOS", String::new());
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(committed_titles(&manager, "MS-DOS"), vec!["Alpha", "Beta"]);

        manager.set_order(
            "MS-DOS",
            GameOrderBy::Title,
            GameOrderDirection::Descending,
        );
        assert_eq!(committed_titles(&manager, "MS-DOS"), vec!["Beta", "Alpha"]);
    }

    #[test]
    fn closed_views_are_gone() {
        let manager = manager(Vec::new());
        manager.open_view("MS-DOS");
        assert!(manager.view_games("MS-DOS").is_some());
        manager.select_game("MS-DOS", Some("1".to_string()));
        assert_eq!(manager.selected_game("MS-DOS").as_deref(), Some("1"));

        manager.close_view("MS-DOS");
        assert!(manager.view_games("MS-DOS").is_none());
        assert!(manager.selected_game("MS-DOS").is_none());
        // Mutating a closed view is a no-op rather than a panic.
        manager.set_order("MS-DOS", GameOrderBy::Title, GameOrderDirection::Ascending);
        manager.select_game("MS-DOS", Some("2".to_string()));
        assert!(manager.selected_game("MS-DOS").is_none());
    }
}
