use gateway_controller_core::Condition;
use serde_json::json;

/// Status recorded for one parent ref of a route.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteParentStatus {
    pub parent_namespace: String,
    pub parent_name: String,
    pub controller_name: String,
    pub conditions: Vec<Condition>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GatewayStatus {
    pub conditions: Vec<Condition>,
    pub addresses: Vec<String>,
    pub listeners: Vec<ListenerStatus>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListenerStatus {
    pub name: String,
    pub attached_routes: u32,
    pub conditions: Vec<Condition>,
}

/// Builds the merge-patch body replacing a route's parent statuses.
pub fn make_route_status_patch(parents: &[RouteParentStatus]) -> serde_json::Value {
    let parents = parents
        .iter()
        .map(|parent| {
            json!({
                "parentRef": {
                    "kind": "Gateway",
                    "namespace": parent.parent_namespace,
                    "name": parent.parent_name,
                },
                "controllerName": parent.controller_name,
                "conditions": parent.conditions,
            })
        })
        .collect::<Vec<_>>();
    json!({ "status": { "parents": parents } })
}

/// Builds the merge-patch body replacing a gateway's status.
pub fn make_gateway_status_patch(status: &GatewayStatus) -> serde_json::Value {
    let addresses = status
        .addresses
        .iter()
        .map(|value| json!({ "type": "IPAddress", "value": value }))
        .collect::<Vec<_>>();
    let listeners = status
        .listeners
        .iter()
        .map(|listener| {
            json!({
                "name": listener.name,
                "attachedRoutes": listener.attached_routes,
                "conditions": listener.conditions,
            })
        })
        .collect::<Vec<_>>();
    json!({
        "status": {
            "conditions": status.conditions,
            "addresses": addresses,
            "listeners": listeners,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_controller_core::{condition, ConditionStatus};
    use pretty_assertions::assert_eq;

    #[test]
    fn route_patch_carries_parent_refs_and_conditions() {
        let accepted = Condition::new(condition::ACCEPTED)
            .status(ConditionStatus::True)
            .reason("Accepted")
            .observed_generation(2);
        let patch = make_route_status_patch(&[RouteParentStatus {
            parent_namespace: "ns".to_string(),
            parent_name: "gw".to_string(),
            controller_name: "example.com/gateway-controller".to_string(),
            conditions: vec![accepted],
        }]);

        assert_eq!(patch["status"]["parents"][0]["parentRef"]["name"], "gw");
        assert_eq!(
            patch["status"]["parents"][0]["controllerName"],
            "example.com/gateway-controller"
        );
        assert_eq!(
            patch["status"]["parents"][0]["conditions"][0]["type"],
            "Accepted"
        );
        assert_eq!(
            patch["status"]["parents"][0]["conditions"][0]["status"],
            "True"
        );
    }

    #[test]
    fn gateway_patch_carries_listeners_and_addresses() {
        let patch = make_gateway_status_patch(&GatewayStatus {
            conditions: vec![Condition::new(condition::ACCEPTED).status(ConditionStatus::True)],
            addresses: vec!["10.0.0.1".to_string()],
            listeners: vec![ListenerStatus {
                name: "https".to_string(),
                attached_routes: 3,
                conditions: vec![],
            }],
        });

        assert_eq!(patch["status"]["addresses"][0]["value"], "10.0.0.1");
        assert_eq!(patch["status"]["listeners"][0]["attachedRoutes"], 3);
        assert_eq!(patch["status"]["listeners"][0]["name"], "https");
    }
}
