use crate::fare_models::{FareDataset, FareMatch, MatchKind, Route};

/// Finds the fare between two stops, matching names case-insensitively.
///
/// A stored route in the query direction wins over one stored the other way round.
/// A reverse hit is relabelled to the caller's `from`/`to` with distance and fare
/// carried over unchanged.
/// Among duplicates the first route in stored order is returned. There is no
/// multi-hop search: two stops only connected through a third yield `None`.
pub fn find_fare(routes: &[Route], from: &str, to: &str) -> Option<FareMatch> {
    let from_key = from.to_lowercase();
    let to_key = to.to_lowercase();

    let same = |stored: &str, key: &str| stored.to_lowercase() == key;

    if let Some(direct) = routes
        .iter()
        .find(|r| same(&r.from, &from_key) && same(&r.to, &to_key))
    {
        return Some(FareMatch {
            route: direct.clone(),
            kind: MatchKind::Direct,
        });
    }

    routes
        .iter()
        .find(|r| same(&r.from, &to_key) && same(&r.to, &from_key))
        .map(|reverse| FareMatch {
            route: Route {
                from: from.to_string(),
                to: to.to_string(),
                distance: reverse.distance,
                fare: reverse.fare,
            },
            kind: MatchKind::Reverse,
        })
}

impl FareDataset {
    pub fn find_fare(&self, from: &str, to: &str) -> Option<FareMatch> {
        find_fare(&self.routes, from, to)
    }
}
