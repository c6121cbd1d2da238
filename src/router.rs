//! Route table for the six application views
//!
//! Paths are static: no parameters, guards, redirects or nesting. Matching
//! ignores query strings, fragments, a trailing slash and letter case.

use serde::Serialize;
use std::sync::OnceLock;

/// Application views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Route {
    Home,
    Market,
    Download,
    Analysis,
    Screening,
    Settings,
}

impl Route {
    pub const ALL: [Route; 6] = [
        Route::Home,
        Route::Market,
        Route::Download,
        Route::Analysis,
        Route::Screening,
        Route::Settings,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::Market => "/market",
            Route::Download => "/download",
            Route::Analysis => "/analysis",
            Route::Screening => "/screening",
            Route::Settings => "/settings",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Route::Home => "Home",
            Route::Market => "Market",
            Route::Download => "Download",
            Route::Analysis => "Analysis",
            Route::Screening => "Screening",
            Route::Settings => "Settings",
        }
    }

    /// View component loaded on first navigation
    pub fn component(self) -> &'static str {
        match self {
            Route::Home => "views/Home.vue",
            Route::Market => "views/Market.vue",
            Route::Download => "views/Download.vue",
            Route::Analysis => "views/Analysis.vue",
            Route::Screening => "views/Screening.vue",
            Route::Settings => "views/Settings.vue",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Serializable route description for the frontend
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteRecord {
    pub path: &'static str,
    pub name: &'static str,
    pub component: &'static str,
}

impl From<Route> for RouteRecord {
    fn from(route: Route) -> Self {
        Self {
            path: route.path(),
            name: route.name(),
            component: route.component(),
        }
    }
}

/// Path to route resolution
#[derive(Debug, Default, Clone, Copy)]
pub struct Router;

impl Router {
    pub fn new() -> Self {
        Self
    }

    /// All route records in declaration order
    pub fn routes(&self) -> Vec<RouteRecord> {
        Route::ALL.iter().copied().map(RouteRecord::from).collect()
    }

    /// Resolve a location to its route
    pub fn resolve(&self, location: &str) -> Option<Route> {
        let path = location
            .split(|c| c == '?' || c == '#')
            .next()
            .unwrap_or_default()
            .trim();

        let path = match path.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };

        Route::ALL
            .iter()
            .copied()
            .find(|route| route.path().eq_ignore_ascii_case(path))
    }
}

/// Views built lazily, once per route
pub struct ViewRegistry<V> {
    factories: Vec<Box<dyn Fn() -> V + Send + Sync>>,
    views: [OnceLock<V>; 6],
}

impl<V> ViewRegistry<V> {
    /// `factory` is called at most once per route, on first access
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(Route) -> V + Send + Sync + Clone + 'static,
    {
        let factories = Route::ALL
            .iter()
            .copied()
            .map(|route| {
                let factory = factory.clone();
                Box::new(move || factory(route)) as Box<dyn Fn() -> V + Send + Sync>
            })
            .collect();

        Self {
            factories,
            views: Default::default(),
        }
    }

    pub fn get(&self, route: Route) -> &V {
        let index = route.index();
        self.views[index].get_or_init(|| (self.factories[index])())
    }

    /// Whether the view for `route` has been built yet
    pub fn is_loaded(&self, route: Route) -> bool {
        self.views[route.index()].get().is_some()
    }
}
