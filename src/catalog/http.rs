//! HTTP catalog client
//!
//! Blocking REST client for the database-security service. One request per
//! call, bearer-token auth, camelCase wire types, page-token pagination.
//! Rate limiting and retries are the service client's concern; none are
//! added here so call ordering stays exactly the batch ordering.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::models::{
    AuditTrail, CollectionState, Compartment, CompartmentId, DependencyKind, DependencyResource,
    LifecycleState, ResourceId, Target, TargetId,
};

use super::{CatalogError, CatalogResult, TargetCatalog};

pub struct HttpCatalog {
    client: reqwest::blocking::Client,
    base: String,
    token: Option<String>,
}

impl HttpCatalog {
    pub fn new(endpoint: &str, token: Option<String>) -> CatalogResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| CatalogError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base: endpoint.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path)
    }

    fn authorize(
        &self,
        request: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn send(
        &self,
        request: reqwest::blocking::RequestBuilder,
    ) -> CatalogResult<reqwest::blocking::Response> {
        let response = self
            .authorize(request)
            .send()
            .map_err(|e| CatalogError::Transport(e.to_string()))?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            let url = response.url().path().to_string();
            return Err(CatalogError::NotFound { resource: url });
        }
        if !status.is_success() {
            let message = response.text().unwrap_or_else(|_| String::new());
            return Err(CatalogError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    fn decode<T: DeserializeOwned>(response: reqwest::blocking::Response) -> CatalogResult<T> {
        response
            .json::<T>()
            .map_err(|e| CatalogError::Decode(e.to_string()))
    }

    /// Drain a paged collection endpoint, following `nextPage` tokens.
    fn list_all<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> CatalogResult<Vec<T>> {
        let mut items = Vec::new();
        let mut page: Option<String> = None;
        loop {
            let mut request = self.client.get(self.url(path)).query(query);
            if let Some(token) = &page {
                request = request.query(&[("page", token.as_str())]);
            }
            let envelope: PageWire<T> = Self::decode(self.send(request)?)?;
            items.extend(envelope.items);
            match envelope.next_page {
                Some(token) => page = Some(token),
                None => break,
            }
        }
        Ok(items)
    }

    fn post_action(&self, path: &str, body: serde_json::Value) -> CatalogResult<()> {
        self.send(self.client.post(self.url(path)).json(&body))?;
        Ok(())
    }

    fn change_compartment(&self, path: &str, destination: &CompartmentId) -> CatalogResult<()> {
        self.post_action(
            &format!("{path}/actions/changeCompartment"),
            serde_json::json!({ "compartmentId": destination.as_str() }),
        )
    }
}

fn kind_path(kind: DependencyKind) -> &'static str {
    match kind {
        DependencyKind::AuditTrail => "auditTrails",
        DependencyKind::SecurityAssessment => "securityAssessments",
        DependencyKind::SecurityPolicy => "securityPolicies",
    }
}

impl TargetCatalog for HttpCatalog {
    fn list_compartments(&self) -> CatalogResult<Vec<Compartment>> {
        let wires: Vec<CompartmentWire> = self.list_all("compartments", &[])?;
        Ok(wires.into_iter().map(CompartmentWire::into_model).collect())
    }

    fn list_targets(
        &self,
        compartment: &CompartmentId,
        states: &[LifecycleState],
    ) -> CatalogResult<Vec<Target>> {
        let base_query = vec![
            ("compartmentId", compartment.as_str().to_string()),
            ("compartmentIdInSubtree", "true".to_string()),
        ];
        // The service filters on a single lifecycleState per request; an
        // OR-set is one pass per state, merged and deduplicated by id.
        let mut targets: Vec<Target> = Vec::new();
        let mut seen = std::collections::HashSet::new();
        let passes: Vec<Vec<(&str, String)>> = if states.is_empty() {
            vec![base_query]
        } else {
            states
                .iter()
                .map(|state| {
                    let mut query = base_query.clone();
                    query.push(("lifecycleState", state.as_str().to_string()));
                    query
                })
                .collect()
        };
        for query in passes {
            let wires: Vec<TargetWire> = self.list_all("targetDatabases", &query)?;
            for wire in wires {
                if seen.insert(wire.id.clone()) {
                    targets.push(wire.into_model());
                }
            }
        }
        Ok(targets)
    }

    fn get_target(&self, id: &TargetId) -> CatalogResult<Target> {
        let path = format!("targetDatabases/{}", id.as_str());
        let wire: TargetWire = Self::decode(self.send(self.client.get(self.url(&path)))?)?;
        Ok(wire.into_model())
    }

    fn relocate_target(&self, id: &TargetId, destination: &CompartmentId) -> CatalogResult<()> {
        self.change_compartment(&format!("targetDatabases/{}", id.as_str()), destination)
    }

    fn refresh_target(&self, id: &TargetId) -> CatalogResult<()> {
        self.post_action(
            &format!("targetDatabases/{}/actions/refresh", id.as_str()),
            serde_json::json!({}),
        )
    }

    fn update_target_tags(
        &self,
        id: &TargetId,
        tags: &BTreeMap<String, String>,
    ) -> CatalogResult<()> {
        let path = format!("targetDatabases/{}", id.as_str());
        let body = serde_json::json!({ "freeformTags": tags });
        self.send(self.client.patch(self.url(&path)).json(&body))?;
        Ok(())
    }

    fn list_dependents(
        &self,
        kind: DependencyKind,
        compartment: &CompartmentId,
        target: &TargetId,
    ) -> CatalogResult<Vec<DependencyResource>> {
        let query = vec![
            ("compartmentId", compartment.as_str().to_string()),
            ("targetId", target.as_str().to_string()),
        ];
        let wires: Vec<DependentWire> = self.list_all(kind_path(kind), &query)?;
        Ok(wires
            .into_iter()
            .map(|wire| wire.into_model(kind))
            .collect())
    }

    fn relocate_dependent(
        &self,
        kind: DependencyKind,
        id: &ResourceId,
        destination: &CompartmentId,
    ) -> CatalogResult<()> {
        self.change_compartment(&format!("{}/{}", kind_path(kind), id.as_str()), destination)
    }

    fn list_audit_trails(&self, target: &TargetId) -> CatalogResult<Vec<AuditTrail>> {
        let query = vec![("targetId", target.as_str().to_string())];
        let wires: Vec<TrailWire> = self.list_all("auditTrails", &query)?;
        Ok(wires.into_iter().map(TrailWire::into_model).collect())
    }

    fn start_audit_trail(&self, id: &ResourceId) -> CatalogResult<()> {
        self.post_action(
            &format!("auditTrails/{}/actions/start", id.as_str()),
            serde_json::json!({}),
        )
    }
}

#[derive(Deserialize)]
struct PageWire<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(rename = "nextPage")]
    next_page: Option<String>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetWire {
    id: String,
    display_name: String,
    lifecycle_state: LifecycleState,
    compartment_id: String,
    #[serde(default)]
    freeform_tags: BTreeMap<String, String>,
}

impl TargetWire {
    fn into_model(self) -> Target {
        Target {
            id: TargetId::new(self.id),
            display_name: self.display_name,
            lifecycle_state: self.lifecycle_state,
            compartment_id: CompartmentId::new(self.compartment_id),
            freeform_tags: self.freeform_tags,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompartmentWire {
    id: String,
    name: String,
    compartment_id: Option<String>,
}

impl CompartmentWire {
    fn into_model(self) -> Compartment {
        Compartment {
            id: CompartmentId::new(self.id),
            name: self.name,
            parent_id: self.compartment_id.map(CompartmentId::new),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DependentWire {
    id: String,
    display_name: String,
    target_id: String,
    compartment_id: String,
}

impl DependentWire {
    fn into_model(self, kind: DependencyKind) -> DependencyResource {
        DependencyResource {
            id: ResourceId::new(self.id),
            kind,
            display_name: self.display_name,
            target_id: TargetId::new(self.target_id),
            compartment_id: CompartmentId::new(self.compartment_id),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrailWire {
    id: String,
    display_name: String,
    target_id: String,
    #[serde(rename = "status")]
    collection_state: CollectionState,
}

impl TrailWire {
    fn into_model(self) -> AuditTrail {
        AuditTrail {
            id: ResourceId::new(self.id),
            display_name: self.display_name,
            target_id: TargetId::new(self.target_id),
            collection_state: self.collection_state,
        }
    }
}
