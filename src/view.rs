use serde::{Deserialize, Serialize};

use crate::model::{Server, ServerId};

/// Minimal fuzzy score for a server to stay visible while searching
const SEARCH_THRESHOLD: f64 = 0.75;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    /// Catalog order
    #[default]
    None,
    Votes,
    Players,
}

/// Initial view applied when the window opens
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartView {
    #[default]
    None,
    Votes,
    Players,
    Favorites,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FavoritesFilter {
    /// Show the favorites list instead of the catalog
    pub show_favorites: bool,
    /// Sort favorites by players
    pub sort_favorites: bool,
}

/// Favorite servers in the order they were added
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Favorites(Vec<Server>);

impl Favorites {
    pub fn contains(&self, id: ServerId) -> bool {
        self.0.iter().any(|s| s.id == id)
    }

    /// Adds `server` or removes it when already present; returns whether it is now a favorite
    pub fn toggle(&mut self, server: &Server) -> bool {
        if self.contains(server.id) {
            self.0.retain(|s| s.id != server.id);
            false
        } else {
            self.0.push(server.clone());
            true
        }
    }

    pub fn servers(&self) -> &[Server] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Servers in display order.
///
/// While favorites are shown with sorting enabled they are ordered by players,
/// whatever `mode` says.
pub fn sorted_view(
    servers: &[Server],
    favorites: &Favorites,
    mode: SortMode,
    filter: FavoritesFilter,
) -> Vec<Server> {
    let mut view = if filter.show_favorites {
        favorites.servers().to_vec()
    } else {
        servers.to_vec()
    };

    let mode = match (filter.show_favorites, filter.sort_favorites) {
        (true, true) => SortMode::Players,
        (true, false) => SortMode::None,
        (false, _) => mode,
    };

    match mode {
        SortMode::None => {}
        SortMode::Votes => view.sort_by(|a, b| b.votes.cmp(&a.votes)),
        SortMode::Players => view.sort_by(|a, b| b.players.cmp(&a.players)),
    }

    view
}

/// Narrows `servers` to fuzzy matches of `query`, best first.
///
/// An empty query keeps the order untouched.
pub fn search(servers: Vec<Server>, query: &str) -> Vec<Server> {
    let query = query.trim();
    if query.is_empty() {
        return servers;
    }

    let mut scored: Vec<(Server, f64)> = servers
        .into_iter()
        .map(|s| {
            let score = s.score(query);
            (s, score)
        })
        .filter(|(_, score)| *score > SEARCH_THRESHOLD)
        .collect();

    // sort by score (reversed order)
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));

    scored.into_iter().map(|(s, _)| s).collect()
}
