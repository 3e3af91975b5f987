//! In-memory fake cloud for engine integration tests.
//!
//! `FakeCloud` plays the remote API: a store of objects keyed by resource
//! identity plus an ordered call log the tests assert against. One
//! `CloudAdapter` per kind reads and mutates that store the way a real
//! adapter would drive a remote service.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;

use stratus_core::{
    structural_eq, AdapterError, AdapterResult, Changeset, ExistenceTransition, Observed,
    Resource, ResourceId, SetDelta,
};
use stratus_engine::ResourceAdapter;

/// The remote side: objects plus an ordered call log.
#[derive(Default)]
pub struct FakeCloud {
    objects: Mutex<BTreeMap<ResourceId, IndexMap<String, Value>>>,
    log: Mutex<Vec<String>>,
}

impl FakeCloud {
    pub fn new_arc() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Pre-populate a remote object.
    pub fn seed(&self, id: ResourceId, attrs: &[(&str, Value)]) {
        let attrs: IndexMap<String, Value> = attrs
            .iter()
            .map(|(field, value)| ((*field).to_string(), value.clone()))
            .collect();
        self.objects.lock().unwrap().insert(id, attrs);
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.log.lock().unwrap().push(entry.into());
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Number of log entries starting with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| entry.starts_with(prefix))
            .count()
    }

    /// Position of the first log entry starting with `prefix`.
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .position(|entry| entry.starts_with(prefix))
    }

    pub fn has_object(&self, id: &ResourceId) -> bool {
        self.objects.lock().unwrap().contains_key(id)
    }

    pub fn object(&self, id: &ResourceId) -> Option<IndexMap<String, Value>> {
        self.objects.lock().unwrap().get(id).cloned()
    }

    fn update_field(&self, id: &ResourceId, field: &str, value: Value) {
        if let Some(attrs) = self.objects.lock().unwrap().get_mut(id) {
            attrs.insert(field.to_string(), value);
        }
    }
}

/// Configurable per-kind adapter over a [`FakeCloud`].
pub struct CloudAdapter {
    kind: String,
    cloud: Arc<FakeCloud>,
    set_fields: Vec<String>,
    resolutions: HashMap<String, String>,
    fail_apply: Option<String>,
    skip_applies: AtomicUsize,
    fail_facts: bool,
    read_delay: Option<Duration>,
    facts: BTreeMap<String, String>,
}

impl CloudAdapter {
    pub fn new(kind: impl Into<String>, cloud: Arc<FakeCloud>) -> Self {
        Self {
            kind: kind.into(),
            cloud,
            set_fields: Vec::new(),
            resolutions: HashMap::new(),
            fail_apply: None,
            skip_applies: AtomicUsize::new(0),
            fail_facts: false,
            read_delay: None,
            facts: BTreeMap::new(),
        }
    }

    /// Converge `field` element-wise instead of replacing it wholesale.
    pub fn with_set_field(mut self, field: impl Into<String>) -> Self {
        self.set_fields.push(field.into());
        self
    }

    /// Answer name→id lookups from a fixed table; unknown names resolve to
    /// `None`. Without a table the default identity resolution applies.
    pub fn with_resolution(mut self, name: impl Into<String>, id: impl Into<String>) -> Self {
        self.resolutions.insert(name.into(), id.into());
        self
    }

    /// Every apply fails with the given reason.
    pub fn failing_apply(mut self, reason: impl Into<String>) -> Self {
        self.fail_apply = Some(reason.into());
        self
    }

    /// The next `n` applies raise a retryable skip.
    pub fn skip_next_applies(self, n: usize) -> Self {
        self.skip_applies.store(n, Ordering::SeqCst);
        self
    }

    /// Fact gathering fails.
    pub fn failing_facts(mut self) -> Self {
        self.fail_facts = true;
        self
    }

    /// Every read stalls for `delay` first.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    /// A fact reported after convergence.
    pub fn with_fact(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.facts.insert(key.into(), value.into());
        self
    }
}

#[async_trait]
impl ResourceAdapter for CloudAdapter {
    fn kind(&self) -> &str {
        &self.kind
    }

    async fn read(&self, resource: &Resource) -> AdapterResult<Observed> {
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
        self.cloud.record(format!("read:{}", resource.id));
        match self.cloud.object(&resource.id) {
            Some(attrs) => {
                let mut observed = Observed::present();
                for (field, value) in attrs {
                    observed = observed.with_attr(field, value);
                }
                Ok(observed)
            }
            None => Err(AdapterError::NotFound),
        }
    }

    async fn resolve(
        &self,
        _resource: &Resource,
        _field: &str,
        name: &str,
    ) -> AdapterResult<Option<String>> {
        if self.resolutions.is_empty() {
            return Ok(Some(name.to_string()));
        }
        Ok(self.resolutions.get(name).cloned())
    }

    async fn apply(&self, resource: &Resource, changes: &Changeset) -> AdapterResult<bool> {
        let remaining = self.skip_applies.load(Ordering::SeqCst);
        if remaining > 0 {
            self.skip_applies
                .store(remaining.saturating_sub(1), Ordering::SeqCst);
            self.cloud.record(format!("apply-skipped:{}", resource.id));
            return Err(AdapterError::skip("project id not yet known"));
        }
        if let Some(reason) = &self.fail_apply {
            self.cloud.record(format!("apply-failed:{}", resource.id));
            return Err(AdapterError::failure(reason.clone()));
        }

        let fields: Vec<&str> = changes.fields().collect();
        self.cloud
            .record(format!("apply:{}:[{}]", resource.id, fields.join(",")));

        match changes.existence_transition() {
            Some(ExistenceTransition::Create) => {
                self.cloud.record(format!("create:{}", resource.id));
                let mut objects = self.cloud.objects.lock().unwrap();
                objects.insert(resource.id.clone(), resource.attributes.clone());
                Ok(true)
            }
            Some(ExistenceTransition::Delete) => {
                self.cloud.record(format!("delete:{}", resource.id));
                self.cloud.objects.lock().unwrap().remove(&resource.id);
                Ok(true)
            }
            None => {
                let mut changed = false;
                for (field, change) in changes.iter() {
                    if self.set_fields.iter().any(|f| f == field) {
                        let delta =
                            SetDelta::from_change(change, structural_eq).unwrap_or_default();
                        for _ in &delta.add {
                            self.cloud
                                .record(format!("create-element:{}:{field}", resource.id));
                        }
                        for _ in &delta.remove {
                            self.cloud
                                .record(format!("delete-element:{}:{field}", resource.id));
                        }
                        changed = changed || !delta.is_empty();
                    } else {
                        self.cloud
                            .record(format!("update:{}:{field}", resource.id));
                        changed = true;
                    }
                    self.cloud
                        .update_field(&resource.id, field, change.desired.clone());
                }
                Ok(changed)
            }
        }
    }

    async fn facts(&self, resource: &Resource) -> AdapterResult<BTreeMap<String, String>> {
        if self.fail_facts {
            return Err(AdapterError::failure("metadata endpoint unavailable"));
        }
        let _ = resource;
        Ok(self.facts.clone())
    }
}
