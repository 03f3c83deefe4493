use crate::agents::dependency_resolver::{FileUpdate, UpdatePlan, apply_file_update, plan_file_updates};
use crate::error::Result;
use crate::forge::{PullRequest, PullRequestForge, UpgradeRequest};
use crate::ivy::Manifest;
use crate::utils::PathValidator;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

const DUPLICATE_SUFFIX: &str = " and duplicate dependency deleted";

/// Tally of one or more manifests' worth of upgrades.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UpgradeReport {
    pub submitted: Vec<PullRequest>,
    pub already_open: usize,
    pub failed: usize,
}

impl UpgradeReport {
    pub fn merge(&mut self, other: UpgradeReport) {
        self.submitted.extend(other.submitted);
        self.already_open += other.already_open;
        self.failed += other.failed;
    }
}

enum Outcome {
    Submitted(PullRequest),
    AlreadyOpen,
}

/// UpgradeAgent edits one manifest per planned update and hands each
/// edit to the forge, restoring the file between updates.
pub struct UpgradeAgent<'a> {
    forge: &'a dyn PullRequestForge,
    repo_root: PathBuf,
    open_titles: HashSet<String>,
}

impl<'a> UpgradeAgent<'a> {
    pub fn new<P: AsRef<Path>>(
        forge: &'a dyn PullRequestForge,
        repo_root: P,
        open_titles: HashSet<String>,
    ) -> Self {
        Self {
            forge,
            repo_root: repo_root.as_ref().to_path_buf(),
            open_titles,
        }
    }

    pub fn process_file(&self, path: &Path, plan: &UpdatePlan) -> Result<UpgradeReport> {
        let git_path = PathValidator::git_path(path, &self.repo_root)?;
        let mut manifest = Manifest::load(path)?;
        let updates = plan_file_updates(&manifest.records(), plan);
        let mut report = UpgradeReport::default();

        if updates.is_empty() {
            debug!("Nothing to upgrade in {git_path}");
        }

        for update in &updates {
            let outcome = self.upgrade_one(&mut manifest, &git_path, update);
            let reverted = manifest.revert_to_original();

            match outcome {
                Ok(Outcome::Submitted(pull)) => {
                    info!("Created pull request #{}: {}", pull.number, pull.url);
                    report.submitted.push(pull);
                }
                Ok(Outcome::AlreadyOpen) => report.already_open += 1,
                Err(e) => {
                    warn!("Upgrade of {} in {git_path} failed: {e}", update.identity);
                    report.failed += 1;
                }
            }
            reverted?;
        }

        manifest.close()?;
        Ok(report)
    }

    fn upgrade_one(
        &self,
        manifest: &mut Manifest,
        git_path: &str,
        update: &FileUpdate,
    ) -> Result<Outcome> {
        apply_file_update(manifest, update)?;
        manifest.save()?;
        debug!("{git_path}\n{}", manifest.changelog());

        let title = pull_request_title(git_path, update);
        if self.open_titles.contains(&title) {
            info!("Pull request already open: {title}");
            return Ok(Outcome::AlreadyOpen);
        }

        let body = pull_request_body(&title, manifest);
        let request = UpgradeRequest {
            branch: branch_name(&update.identity.name, &update.new_version),
            git_path: git_path.to_string(),
            content: fs::read_to_string(manifest.path())?,
            title,
            body,
        };

        info!("Submitting pull request: {}", request.title);
        Ok(Outcome::Submitted(self.forge.submit_upgrade(&request)?))
    }
}

pub fn pull_request_title(git_path: &str, update: &FileUpdate) -> String {
    let mut title = format!(
        "fireant upgrade dependency {} in {git_path} from {} to {}",
        update.identity.name, update.old_version, update.new_version
    );
    if update.removes_duplicates() {
        title.push_str(DUPLICATE_SUFFIX);
    }
    title
}

fn pull_request_body(title: &str, manifest: &Manifest) -> String {
    let mut body = format!("{title}\n\nChanges:\n");
    for entry in manifest.changelog().saved() {
        body.push_str(&format!("- {entry}\n"));
    }
    body
}

/// `fireant_{name}_{version}`, restricted to characters git accepts in refs.
pub fn branch_name(name: &str, version: &str) -> String {
    format!("fireant_{name}_{version}")
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
            _ => '-',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FireantError;
    use crate::ivy::Identity;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const IVY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ivy-module version="1.0">
  <info organisation="org.apache.nutch" module="parse-tika"/>
  <dependencies>
    <dependency org="org.slf4j" name="slf4j-api" rev="1.7.30" conf="*->master"/>
    <dependency org="org.apache.tika" name="tika-parsers" rev="1.24"/>
    <dependency org="org.slf4j" name="slf4j-api" rev="1.7.30"/>
    <dependency org="junit" name="junit" rev="4.13.2"/>
  </dependencies>
</ivy-module>
"#;

    #[derive(Default)]
    struct FakeForge {
        requests: Mutex<Vec<UpgradeRequest>>,
        existing_branches: Vec<String>,
    }

    impl PullRequestForge for FakeForge {
        fn open_pull_request_titles(&self) -> Result<HashSet<String>> {
            Ok(HashSet::new())
        }

        fn sync_fork(&self) -> Result<()> {
            Ok(())
        }

        fn submit_upgrade(&self, request: &UpgradeRequest) -> Result<PullRequest> {
            if self.existing_branches.contains(&request.branch) {
                return Err(FireantError::BranchExists(request.branch.clone()));
            }
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            Ok(PullRequest {
                number: requests.len() as u64,
                url: format!("https://github.com/apache/nutch/pull/{}", requests.len()),
            })
        }
    }

    fn workspace() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let plugin = dir.path().join("src/plugin/parse-tika");
        fs::create_dir_all(&plugin).unwrap();
        let path = plugin.join("ivy.xml");
        fs::write(&path, IVY).unwrap();
        (dir, path)
    }

    fn plan_for(path: &Path) -> UpdatePlan {
        let manifest = Manifest::load(path).unwrap();
        let latest: HashMap<Identity, String> = [
            (Identity::new("org.slf4j", "slf4j-api"), "1.7.32".to_string()),
            (Identity::new("org.apache.tika", "tika-parsers"), "1.27".to_string()),
            (Identity::new("junit", "junit"), "4.13.2".to_string()),
        ]
        .into_iter()
        .collect();
        let plan = UpdatePlan::build(&manifest.records(), &latest);
        manifest.close().unwrap();
        plan
    }

    #[test]
    fn each_update_gets_its_own_pull_request_and_file_is_restored() {
        let (dir, path) = workspace();
        let plan = plan_for(&path);
        let forge = FakeForge::default();
        let agent = UpgradeAgent::new(&forge, dir.path(), HashSet::new());

        let report = agent.process_file(&path, &plan).unwrap();

        assert_eq!(report.submitted.len(), 2);
        assert_eq!(report.failed, 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), IVY);

        let requests = forge.requests.lock().unwrap();
        let slf4j = &requests[0];
        assert_eq!(slf4j.branch, "fireant_slf4j-api_1.7.32");
        assert_eq!(slf4j.git_path, "src/plugin/parse-tika/ivy.xml");
        assert_eq!(
            slf4j.title,
            "fireant upgrade dependency slf4j-api in src/plugin/parse-tika/ivy.xml \
             from 1.7.30 to 1.7.32 and duplicate dependency deleted"
        );
        assert!(slf4j.content.contains(r#"name="slf4j-api" rev="1.7.32" conf="*->master""#));
        assert_eq!(slf4j.content.matches("slf4j-api").count(), 1);
        assert!(slf4j.content.contains(r#"rev="1.24""#));
        assert!(slf4j.body.contains("- Remove slf4j-api 1.7.30\n"));
        assert!(slf4j.body.contains("- Update slf4j-api 1.7.30 -> 1.7.32\n"));

        let tika = &requests[1];
        assert_eq!(tika.branch, "fireant_tika-parsers_1.27");
        assert!(tika.content.contains(r#"rev="1.27""#));
        assert_eq!(tika.content.matches("slf4j-api").count(), 2);
        assert!(!tika.title.ends_with(DUPLICATE_SUFFIX));
    }

    #[test]
    fn open_titles_are_not_resubmitted() {
        let (dir, path) = workspace();
        let plan = plan_for(&path);
        let forge = FakeForge::default();
        let open: HashSet<String> = [
            "fireant upgrade dependency tika-parsers in src/plugin/parse-tika/ivy.xml from 1.24 to 1.27"
                .to_string(),
        ]
        .into_iter()
        .collect();
        let agent = UpgradeAgent::new(&forge, dir.path(), open);

        let report = agent.process_file(&path, &plan).unwrap();

        assert_eq!(report.submitted.len(), 1);
        assert_eq!(report.already_open, 1);
        assert_eq!(fs::read_to_string(&path).unwrap(), IVY);
    }

    #[test]
    fn forge_failures_are_counted_and_skipped() {
        let (dir, path) = workspace();
        let plan = plan_for(&path);
        let forge = FakeForge {
            existing_branches: vec!["fireant_slf4j-api_1.7.32".into()],
            ..FakeForge::default()
        };
        let agent = UpgradeAgent::new(&forge, dir.path(), HashSet::new());

        let report = agent.process_file(&path, &plan).unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.submitted.len(), 1);
        assert_eq!(forge.requests.lock().unwrap()[0].branch, "fireant_tika-parsers_1.27");
        assert_eq!(fs::read_to_string(&path).unwrap(), IVY);
    }

    #[test]
    fn malformed_manifest_is_an_error() {
        let (dir, path) = workspace();
        fs::write(&path, "<ivy-module><dependencies>").unwrap();
        let forge = FakeForge::default();
        let agent = UpgradeAgent::new(&forge, dir.path(), HashSet::new());
        assert!(matches!(
            agent.process_file(&path, &UpdatePlan::default()),
            Err(FireantError::Parse { .. })
        ));
    }

    #[test]
    fn branch_names_are_ref_safe() {
        assert_eq!(branch_name("commons-lang3", "3.12.0"), "fireant_commons-lang3_3.12.0");
        assert_eq!(branch_name("odd name", "1:2"), "fireant_odd-name_1-2");
    }
}
