//! The reconciliation engine: dependency-ordered convergence of one batch.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use serde_json::Value;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use stratus_core::{
    structural_eq, AdapterError, Changeset, Error, Existence, Observed, Outcome, Resource,
    ResourceId, ResourceSet,
};
use stratus_graph::{
    DependencyBuilder, DependencyGraph, KindSchema, RefCardinality, SchemaRegistry,
    UnresolvedPolicy,
};

use crate::adapter::{AdapterRegistry, ResourceAdapter};
use crate::report::{AppliedChange, PassReport, ResourceReport};

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum resources reconciling concurrently.
    pub max_concurrent: usize,
    /// Wall-clock budget for one pass. Once exceeded, nothing new is
    /// dispatched; units in flight finish their current adapter call and
    /// every still-pending resource reports skipped.
    pub pass_timeout: Option<Duration>,
    /// Compute and report changesets without applying anything.
    pub dry_run: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            pass_timeout: None,
            dry_run: false,
        }
    }
}

/// Drives convergence of each resource in dependency order, with
/// per-resource isolation of failure.
pub struct Engine {
    adapters: AdapterRegistry,
    schemas: SchemaRegistry,
    config: EngineConfig,
}

/// Everything known about a resource once it reaches a terminal state.
#[derive(Debug)]
struct Completion {
    outcome: Outcome,
    applied: Option<AppliedChange>,
    pending: Option<Changeset>,
    facts: BTreeMap<String, String>,
}

impl Completion {
    fn converged(applied: Option<AppliedChange>, facts: BTreeMap<String, String>) -> Self {
        Self {
            outcome: Outcome::Converged,
            applied,
            pending: None,
            facts,
        }
    }

    fn skipped(reason: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::skipped(reason),
            applied: None,
            pending: None,
            facts: BTreeMap::new(),
        }
    }

    fn failed(reason: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::failed(reason),
            applied: None,
            pending: None,
            facts: BTreeMap::new(),
        }
    }

    fn dry_run(pending: Changeset) -> Self {
        Self {
            outcome: Outcome::skipped(format!("dry run: {} change(s) pending", pending.len())),
            applied: None,
            pending: Some(pending),
            facts: BTreeMap::new(),
        }
    }
}

impl Engine {
    /// Create an engine over an adapter registry and the kind schemas of
    /// the deployment model.
    pub fn new(adapters: AdapterRegistry, schemas: SchemaRegistry, config: EngineConfig) -> Self {
        Self {
            adapters,
            schemas,
            config,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one reconciliation pass over `set`.
    ///
    /// Configuration errors (dangling references, cycles, unknown kinds)
    /// are reported before any apply begins: the affected resources and
    /// their dependents never reach an adapter, while independent
    /// resources reconcile normally. There is no global rollback; partial
    /// convergence is expected, the next pass re-reads and re-diffs.
    pub async fn run(&self, mut set: ResourceSet) -> PassReport {
        info!(
            resources = set.len(),
            dry_run = self.config.dry_run,
            "starting reconciliation pass"
        );

        let mut config_errors = DependencyBuilder::new(&self.schemas).infer(&mut set);

        let (graph, graph_errors) = DependencyGraph::from_set(&set);
        config_errors.extend(graph_errors);
        config_errors.extend(graph.cycle_errors());

        for resource in set.iter() {
            if !self.adapters.contains(&resource.id.kind) {
                config_errors.push(Error::unknown_kind(
                    resource.id.clone(),
                    resource.id.kind.clone(),
                ));
            }
        }

        let mut completions: HashMap<ResourceId, Completion> = HashMap::new();
        for error in &config_errors {
            warn!(resource = %error.resource(), error = %error, "configuration error");
            completions
                .entry(error.resource().clone())
                .or_insert_with(|| Completion::failed(error.to_string()));
        }

        self.drive(&mut set, &graph, &mut completions).await;

        let resources = set
            .iter()
            .map(|resource| {
                let completion = completions
                    .remove(&resource.id)
                    .unwrap_or_else(|| Completion::skipped("pass deadline exceeded"));
                ResourceReport {
                    id: resource.id.clone(),
                    outcome: completion.outcome,
                    applied: completion.applied,
                    pending: completion.pending,
                    facts: completion.facts,
                }
            })
            .collect();

        let report = PassReport::new(resources);
        info!(
            converged = report.converged,
            skipped = report.skipped,
            failed = report.failed,
            "reconciliation pass complete"
        );
        report
    }

    /// Worker pool over the dependency partial order.
    ///
    /// A unit is dispatched only once every requirement is terminal; a unit
    /// with a non-converged requirement is short-circuited to skipped
    /// without touching its adapter. Resources without a path between them
    /// run concurrently, bounded by `max_concurrent`.
    async fn drive(
        &self,
        set: &mut ResourceSet,
        graph: &DependencyGraph,
        completions: &mut HashMap<ResourceId, Completion>,
    ) {
        let ids = set.ids();
        let max_concurrent = self.config.max_concurrent.max(1);
        let deadline = self.config.pass_timeout.map(|t| Instant::now() + t);

        let mut waiting: HashMap<ResourceId, usize> = ids
            .iter()
            .map(|id| (id.clone(), graph.requirements(id).len()))
            .collect();
        let mut started: HashSet<ResourceId> = HashSet::new();
        let mut newly_terminal: Vec<ResourceId> = Vec::new();
        let mut tasks: JoinSet<(ResourceId, Resource, Completion)> = JoinSet::new();

        // Resources poisoned by configuration errors are terminal from the
        // start; their dependents cascade below.
        for id in &ids {
            if completions.contains_key(id) {
                started.insert(id.clone());
                newly_terminal.push(id.clone());
            }
        }

        loop {
            while let Some(done) = newly_terminal.pop() {
                for dependent in graph.dependents(&done) {
                    if let Some(count) = waiting.get_mut(&dependent) {
                        *count = count.saturating_sub(1);
                    }
                }
            }

            let expired = deadline.is_some_and(|d| Instant::now() >= d);
            if !expired {
                for id in &ids {
                    if tasks.len() >= max_concurrent {
                        break;
                    }
                    if started.contains(id) || waiting.get(id).copied().unwrap_or(0) > 0 {
                        continue;
                    }
                    started.insert(id.clone());

                    let blocked = graph.requirements(id).into_iter().find(|requirement| {
                        completions
                            .get(requirement)
                            .is_some_and(|c| !c.outcome.is_converged())
                    });
                    if let Some(requirement) = blocked {
                        debug!(resource = %id, requirement = %requirement, "short-circuited");
                        completions.insert(
                            id.clone(),
                            Completion::skipped(format!(
                                "requirement {requirement} did not converge"
                            )),
                        );
                        newly_terminal.push(id.clone());
                        continue;
                    }

                    let Some(resource) = set.get(id).cloned() else {
                        continue;
                    };
                    let Some(adapter) = self.adapters.get(&id.kind) else {
                        continue;
                    };
                    let schema = self.schemas.get(&id.kind).cloned();
                    let dry_run = self.config.dry_run;
                    let unit_id = id.clone();
                    tasks.spawn(async move {
                        let (resource, completion) =
                            reconcile_resource(adapter, schema, resource, dry_run).await;
                        (unit_id, resource, completion)
                    });
                }
            }

            if !newly_terminal.is_empty() {
                continue;
            }
            if tasks.is_empty() {
                break;
            }

            let joined = match deadline {
                Some(d) if Instant::now() < d => match timeout_at(d, tasks.join_next()).await {
                    Ok(joined) => joined,
                    // Deadline reached: stop dispatching, let in-flight
                    // units finish their current adapter call.
                    Err(_) => continue,
                },
                _ => tasks.join_next().await,
            };
            let Some(result) = joined else {
                continue;
            };
            match result {
                Ok((id, resource, completion)) => {
                    debug!(resource = %id, outcome = %completion.outcome, "resource terminal");
                    if let Some(slot) = set.get_mut(&id) {
                        *slot = resource;
                    }
                    completions.insert(id.clone(), completion);
                    newly_terminal.push(id);
                }
                Err(join_error) => {
                    warn!(error = %join_error, "reconciliation unit aborted");
                }
            }
        }
    }
}

/// One resource's full convergence cycle: read, resolve, diff, apply.
async fn reconcile_resource(
    adapter: Arc<dyn ResourceAdapter>,
    schema: Option<KindSchema>,
    mut resource: Resource,
    dry_run: bool,
) -> (Resource, Completion) {
    if !resource.managed {
        return (resource, Completion::skipped("not managed"));
    }

    match adapter.read(&resource).await {
        Ok(observed) => resource.record_observation(observed),
        Err(AdapterError::NotFound) => resource.record_observation(Observed::absent()),
        Err(AdapterError::Skip(reason)) => return (resource, Completion::skipped(reason)),
        Err(err) => return (resource, Completion::failed(format!("read failed: {err}"))),
    }
    debug!(resource = %resource.id, existence = ?resource.existence(), "observed");

    let desired = match normalize_references(adapter.as_ref(), schema.as_ref(), &resource).await {
        Ok(desired) => desired,
        Err(completion) => return (resource, completion),
    };

    let mut changes = adapter.diff(&resource, &desired);
    if let Some(schema) = &schema {
        for field in &schema.set_fields {
            changes.prune_set_field(field, structural_eq);
        }
    }

    if changes.is_empty() {
        debug!(resource = %resource.id, "no drift");
        let facts = gather_facts(adapter.as_ref(), &resource).await;
        return (resource, Completion::converged(None, facts));
    }

    if changes.existence_transition().is_some() {
        // An existence transition is exclusive: attribute edits wait for
        // the next pass, after the created object has been re-read.
        changes = changes.existence_only();
    }

    if dry_run {
        debug!(resource = %resource.id, changes = changes.len(), "dry run");
        return (resource, Completion::dry_run(changes));
    }

    match adapter.apply(&resource, &changes).await {
        Ok(applied) => {
            let change = applied.then(|| AppliedChange::from_changeset(&changes));
            let facts = gather_facts(adapter.as_ref(), &resource).await;
            (resource, Completion::converged(change, facts))
        }
        Err(AdapterError::Skip(reason)) => (resource, Completion::skipped(reason)),
        Err(err) => (resource, Completion::failed(format!("apply failed: {err}"))),
    }
}

/// Normalize declared reference names to the remote ids the observation
/// exposes, so the diff compares at id level instead of name level.
///
/// Resolution only runs for reference fields with apparent drift; an equal
/// declared and observed value needs no lookup.
async fn normalize_references(
    adapter: &dyn ResourceAdapter,
    schema: Option<&KindSchema>,
    resource: &Resource,
) -> Result<IndexMap<String, Value>, Completion> {
    let mut desired = resource.attributes.clone();
    let (Some(schema), Some(observed)) = (schema, resource.observed.as_ref()) else {
        return Ok(desired);
    };
    if observed.existence != Existence::Present || resource.purged {
        return Ok(desired);
    }

    for ref_field in &schema.refs {
        if ref_field.cardinality != RefCardinality::One {
            continue;
        }
        let Some(declared) = resource
            .attributes
            .get(&ref_field.field)
            .and_then(Value::as_str)
        else {
            continue;
        };
        if declared.is_empty() {
            continue;
        }
        let Some(current) = observed.attributes.get(&ref_field.field) else {
            continue;
        };
        if current.as_str() == Some(declared) {
            continue;
        }

        match adapter.resolve(resource, &ref_field.field, declared).await {
            Ok(Some(id)) => {
                desired.insert(ref_field.field.clone(), Value::String(id));
            }
            Ok(None) => match ref_field.on_unresolved {
                UnresolvedPolicy::TreatAsUnchanged => {
                    debug!(
                        resource = %resource.id,
                        field = %ref_field.field,
                        "reference unresolved, treating as unchanged"
                    );
                    desired.shift_remove(&ref_field.field);
                }
                UnresolvedPolicy::Error => {
                    return Err(Completion::failed(format!(
                        "cannot resolve {} '{declared}' referenced by field '{}'",
                        ref_field.target_kind, ref_field.field
                    )));
                }
            },
            Err(AdapterError::Skip(reason)) => return Err(Completion::skipped(reason)),
            Err(err) => {
                return Err(Completion::failed(format!(
                    "resolving field '{}': {err}",
                    ref_field.field
                )))
            }
        }
    }

    Ok(desired)
}

/// Best-effort fact gathering; failures are logged, never raised.
async fn gather_facts(
    adapter: &dyn ResourceAdapter,
    resource: &Resource,
) -> BTreeMap<String, String> {
    match adapter.facts(resource).await {
        Ok(facts) => facts,
        Err(err) => {
            warn!(resource = %resource.id, error = %err, "fact gathering failed");
            BTreeMap::new()
        }
    }
}
