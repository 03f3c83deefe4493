use crate::config::Settings;
use crate::error::{FireantError, Result};
use crate::ivy::{DependencyRecord, Identity, Manifest};
use crate::maven::version::Version;
use crate::repository::VersionLookup;
use crate::utils::worker_pool;
use glob::Pattern;
use indicatif::ProgressBar;
use log::{debug, warn};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// DependencyResolver turns manifest records into an update plan.
pub struct DependencyResolver {
    lookup: Arc<dyn VersionLookup>,
    workers: usize,
    capacity: usize,
    retry: RetryPolicy,
    ignore: IgnoreList,
}

impl DependencyResolver {
    pub fn new(lookup: Arc<dyn VersionLookup>, settings: &Settings) -> Result<Self> {
        Ok(Self {
            lookup,
            workers: settings.lookup_workers,
            capacity: settings.maximum_dependencies,
            retry: RetryPolicy::from_settings(settings),
            ignore: IgnoreList::new(&settings.ignore)?,
        })
    }

    /// Identities worth a registry query, each once, in a stable order.
    pub fn lookup_candidates(&self, records: &[DependencyRecord]) -> Vec<Identity> {
        let unique: BTreeSet<Identity> = records
            .iter()
            .filter_map(DependencyRecord::identity)
            .filter(|identity| !self.ignore.matches(&identity.name))
            .collect();
        unique.into_iter().collect()
    }

    /// Latest stable version per identity. Identities whose lookup keeps
    /// failing are logged and left out.
    pub fn resolve_latest(
        &self,
        identities: Vec<Identity>,
        progress: &ProgressBar,
    ) -> HashMap<Identity, String> {
        let lookup = self.lookup.as_ref();
        let retry = self.retry;

        let resolved = worker_pool::run(identities, self.workers, self.capacity, |identity| {
            let result = lookup_with_retry(lookup, &identity, &retry);
            progress.inc(1);
            match result {
                Ok(version) => {
                    debug!("{identity}: latest stable version is {version}");
                    Some((identity, version))
                }
                Err(e) => {
                    warn!("Skipping {identity}: {e}");
                    None
                }
            }
        });

        resolved.into_iter().collect()
    }
}

const MAX_BACKOFF: Duration = Duration::from_secs(8);

/// Bounded retries with a pause that doubles after every failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            attempts: settings.http_retry_attempts,
            initial_backoff: Duration::from_millis(settings.http_retry_backoff_ms),
            max_backoff: MAX_BACKOFF,
        }
    }

    /// Pause after the `attempt`-th failure (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Ask `lookup`, retrying registry failures as `policy` allows.
pub fn lookup_with_retry(
    lookup: &dyn VersionLookup,
    identity: &Identity,
    policy: &RetryPolicy,
) -> Result<String> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match lookup.latest_stable_version(identity) {
            Ok(version) => return Ok(version),
            Err(e) if e.is_retryable() && attempt < attempts => {
                let delay = policy.backoff(attempt);
                debug!(
                    "Lookup of {identity} failed (attempt {attempt}/{attempts}), retrying in {delay:?}: {e}"
                );
                thread::sleep(delay);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Dependency names excluded from upgrades, as glob patterns.
#[derive(Debug, Default)]
pub struct IgnoreList {
    patterns: Vec<Pattern>,
}

impl IgnoreList {
    pub fn new(patterns: &[String]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Pattern::new(p)
                    .map_err(|e| FireantError::config(format!("Invalid ignore pattern '{p}': {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn matches(&self, name: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedUpdate {
    pub record: DependencyRecord,
    pub latest_version: String,
}

/// Stale identities mapped to the record that represents them and the
/// version to move to. Built once per run and shared read-only.
#[derive(Debug, Clone, Default)]
pub struct UpdatePlan {
    entries: BTreeMap<Identity, PlannedUpdate>,
}

impl UpdatePlan {
    /// A record is stale when its revision differs from the latest version.
    /// When several stale records share an identity the one with the highest
    /// revision represents it; ties keep the first seen.
    pub fn build(records: &[DependencyRecord], latest: &HashMap<Identity, String>) -> Self {
        let mut entries: BTreeMap<Identity, PlannedUpdate> = BTreeMap::new();

        for record in records {
            let Some(identity) = record.identity() else {
                continue;
            };
            let Some(latest_version) = latest.get(&identity) else {
                continue;
            };
            if record.revision() == Some(latest_version.as_str()) {
                continue;
            }

            let candidate = PlannedUpdate {
                record: record.clone(),
                latest_version: latest_version.clone(),
            };
            match entries.entry(identity) {
                Entry::Vacant(slot) => {
                    slot.insert(candidate);
                }
                Entry::Occupied(mut slot) => {
                    if revision_of(&candidate.record) > revision_of(&slot.get().record) {
                        slot.insert(candidate);
                    }
                }
            }
        }

        for (identity, update) in &entries {
            debug!(
                "Should update {identity} from {} to {}",
                update.record.revision().unwrap_or("<none>"),
                update.latest_version
            );
        }

        Self { entries }
    }

    pub fn get(&self, identity: &Identity) -> Option<&PlannedUpdate> {
        self.entries.get(identity)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Identity, &PlannedUpdate)> {
        self.entries.iter()
    }
}

fn revision_of(record: &DependencyRecord) -> Version {
    Version::parse(record.revision().unwrap_or_default())
}

/// One upgrade within a single manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpdate {
    /// Position of the surviving record; duplicates all come later.
    pub index: usize,
    pub identity: Identity,
    pub old_version: String,
    pub new_version: String,
    /// Positions of later records sharing the identity, ascending, as they
    /// stand before any removal.
    pub duplicate_indices: Vec<usize>,
}

impl FileUpdate {
    pub fn removes_duplicates(&self) -> bool {
        !self.duplicate_indices.is_empty()
    }

    pub fn changes_version(&self) -> bool {
        self.old_version != self.new_version
    }
}

/// Updates for one manifest, first occurrence of each planned identity in
/// document order. Positions refer to the untouched manifest, so each
/// update must be applied to a freshly reverted copy.
pub fn plan_file_updates(records: &[DependencyRecord], plan: &UpdatePlan) -> Vec<FileUpdate> {
    let mut seen: HashSet<Identity> = HashSet::new();
    let mut updates = Vec::new();

    for (index, record) in records.iter().enumerate() {
        let Some(identity) = record.identity() else {
            continue;
        };
        let Some(planned) = plan.get(&identity) else {
            continue;
        };
        if !seen.insert(identity.clone()) {
            continue;
        }

        let duplicate_indices: Vec<usize> = records
            .iter()
            .enumerate()
            .skip(index + 1)
            .filter(|(_, other)| other.identity().as_ref() == Some(&identity))
            .map(|(position, _)| position)
            .collect();

        let update = FileUpdate {
            index,
            identity,
            old_version: record.revision().unwrap_or_default().to_string(),
            new_version: planned.latest_version.clone(),
            duplicate_indices,
        };

        if update.changes_version() || update.removes_duplicates() {
            updates.push(update);
        }
    }

    updates
}

/// Remove the duplicates, then move the survivor to the new version.
pub fn apply_file_update(manifest: &mut Manifest, update: &FileUpdate) -> Result<()> {
    for (removed, position) in update.duplicate_indices.iter().enumerate() {
        debug!(
            "Removing duplicate {} in {}",
            update.identity,
            manifest.path().display()
        );
        manifest.remove(position - removed)?;
    }
    if update.changes_version() {
        manifest.modify_version(update.index, &update.new_version)?;
    }
    Ok(())
}
