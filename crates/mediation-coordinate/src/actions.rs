//! Translation between keylist actions and routing table actions
//!
//! Both directions are table lookups indexed by the stable enum
//! discriminants, so adding a variant on one side without extending the
//! tables fails to compile.

use mediation_core::messages::KeylistAction;
use mediation_routing::RouteAction;

const KEYLIST_TO_ROUTE: [RouteAction; KeylistAction::ALL.len()] =
    [RouteAction::Create, RouteAction::Delete];

const ROUTE_TO_KEYLIST: [KeylistAction; RouteAction::ALL.len()] =
    [KeylistAction::Add, KeylistAction::Remove];

const _: () = assert!(KeylistAction::ALL.len() == RouteAction::ALL.len());

/// Routing action for a keylist action
pub const fn route_action(action: KeylistAction) -> RouteAction {
    KEYLIST_TO_ROUTE[action.index()]
}

/// Keylist action for a routing action
pub const fn keylist_action(action: RouteAction) -> KeylistAction {
    ROUTE_TO_KEYLIST[action.index()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn mapping_is_a_bijection() {
        let routes: HashSet<RouteAction> = KeylistAction::ALL.into_iter().map(route_action).collect();
        assert_eq!(routes.len(), RouteAction::ALL.len());

        for action in KeylistAction::ALL {
            assert_eq!(keylist_action(route_action(action)), action);
        }
        for action in RouteAction::ALL {
            assert_eq!(route_action(keylist_action(action)), action);
        }
    }

    #[test]
    fn add_creates_and_remove_deletes() {
        assert_eq!(route_action(KeylistAction::Add), RouteAction::Create);
        assert_eq!(route_action(KeylistAction::Remove), RouteAction::Delete);
    }
}
