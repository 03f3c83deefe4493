use crate::agents::{
    DependencyResolver, ProjectScannerAgent, UpdatePlan, UpgradeAgent, UpgradeReport,
    VersionControlAgent,
};
use crate::config::{Credentials, Settings};
use crate::error::Result;
use crate::forge::{GitHubForge, PullRequestForge};
use crate::ivy::{DependencyRecord, Manifest};
use crate::maven::VersionComparator;
use crate::repository::RepositoryFactory;
use crate::utils::worker_pool;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Counters printed at the end of a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub manifests: usize,
    pub unreadable_manifests: usize,
    pub looked_up: usize,
    pub resolved: usize,
    pub stale: usize,
    pub upgrades: UpgradeReport,
    pub failed_manifests: usize,
}

/// One complete run: sync the working copy, scan, look up, plan, and open
/// a pull request per stale dependency.
pub fn execute_run(settings: &Settings, credentials: Credentials, dry_run: bool) -> Result<()> {
    println!("{}", "Upgrading Ivy dependencies...".cyan().bold());
    if dry_run {
        println!("{}", "(dry run: nothing will be edited or submitted)".dimmed());
    }

    let forge = GitHubForge::new(settings, credentials)?;

    println!("\n{}", "1. Preparing working copy...".yellow());
    let vcs = prepare_working_copy(settings, &forge, dry_run)?;
    println!(
        "{}",
        format!("✓ Working copy ready at {}", vcs.repo_path().display()).green()
    );

    println!("\n{}", "2. Scanning manifests...".yellow());
    let scanner = ProjectScannerAgent::new(vcs.repo_path())?;
    let manifests = scanner.discover(&settings.manifest_glob)?;
    let (records, unreadable) = collect_records(&manifests);
    println!(
        "{}",
        format!(
            "✓ Found {} dependencies in {} manifests",
            records.len(),
            manifests.len() - unreadable
        )
        .green()
    );

    let mut summary = RunSummary {
        manifests: manifests.len(),
        unreadable_manifests: unreadable,
        ..RunSummary::default()
    };

    println!("\n{}", "3. Looking up latest stable versions...".yellow());
    let lookup = RepositoryFactory::create_maven_search(settings)?;
    let resolver = DependencyResolver::new(lookup, settings)?;
    let identities = resolver.lookup_candidates(&records);
    summary.looked_up = identities.len();

    let progress = lookup_progress(identities.len());
    let latest = resolver.resolve_latest(identities, &progress);
    progress.finish_and_clear();
    summary.resolved = latest.len();
    println!(
        "{}",
        format!(
            "✓ Resolved {} of {} dependencies",
            summary.resolved, summary.looked_up
        )
        .green()
    );

    println!("\n{}", "4. Planning upgrades...".yellow());
    let plan = UpdatePlan::build(&records, &latest);
    summary.stale = plan.len();
    print_plan(&plan);

    if dry_run {
        print_summary(&summary);
        return Ok(());
    }

    println!("\n{}", "5. Fetching open pull requests...".yellow());
    let open_titles = match forge.open_pull_request_titles() {
        Ok(titles) => titles,
        Err(e) => {
            warn!("Could not list open pull requests: {e}");
            HashSet::new()
        }
    };
    println!(
        "{}",
        format!("✓ {} pull requests already open", open_titles.len()).green()
    );

    println!("\n{}", "6. Submitting upgrades...".yellow());
    let agent = UpgradeAgent::new(&forge, vcs.repo_path(), open_titles);
    let (upgrades, failed_manifests) = submit_upgrades(&agent, manifests, &plan, settings);
    summary.upgrades = upgrades;
    summary.failed_manifests = failed_manifests;

    match vcs.is_working_directory_clean() {
        Ok(true) => {}
        Ok(false) => warn!("Working copy has local modifications after the run"),
        Err(e) => warn!("Could not check working copy status: {e}"),
    }

    print_summary(&summary);
    Ok(())
}

fn prepare_working_copy(
    settings: &Settings,
    forge: &dyn PullRequestForge,
    dry_run: bool,
) -> Result<VersionControlAgent> {
    let (vcs, cloned) =
        VersionControlAgent::clone_if_missing(&settings.forked_repo, &settings.repo_path)?;
    if cloned {
        println!("   Cloned {}", settings.forked_repo.bright_cyan());
        return Ok(vcs);
    }

    if !dry_run {
        if let Err(e) = forge.sync_fork() {
            warn!("Fork sync skipped: {e}");
        }
    }
    vcs.pull()?;
    println!("   Pulled latest {}", settings.main_branch.bright_cyan());
    Ok(vcs)
}

/// Records of every readable manifest, in manifest order. Unreadable files
/// are logged and counted.
fn collect_records(manifests: &[PathBuf]) -> (Vec<DependencyRecord>, usize) {
    let mut records = Vec::new();
    let mut unreadable = 0;

    for path in manifests {
        match load_records(path) {
            Ok(found) => {
                debug!("{}: {} dependencies", path.display(), found.len());
                records.extend(found);
            }
            Err(e) => {
                warn!("Skipping {}: {e}", path.display());
                unreadable += 1;
            }
        }
    }

    (records, unreadable)
}

fn load_records(path: &Path) -> Result<Vec<DependencyRecord>> {
    let manifest = Manifest::load(path)?;
    let records = manifest.records();
    manifest.close()?;
    Ok(records)
}

fn submit_upgrades(
    agent: &UpgradeAgent<'_>,
    manifests: Vec<PathBuf>,
    plan: &UpdatePlan,
    settings: &Settings,
) -> (UpgradeReport, usize) {
    let results = worker_pool::run(
        manifests,
        settings.upgrade_workers,
        settings.maximum_dependencies,
        |path| match agent.process_file(&path, plan) {
            Ok(report) => Some(Ok(report)),
            Err(e) => {
                warn!("Skipping {}: {e}", path.display());
                Some(Err(()))
            }
        },
    );

    let mut total = UpgradeReport::default();
    let mut failed = 0;
    for result in results {
        match result {
            Ok(report) => total.merge(report),
            Err(()) => failed += 1,
        }
    }
    (total, failed)
}

fn lookup_progress(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar().template("  [{bar:40}] {pos}/{len} {msg}") {
        pb.set_style(style.progress_chars("=>-"));
    }
    pb
}

fn print_plan(plan: &UpdatePlan) {
    if plan.is_empty() {
        println!("{}", "✓ All dependencies are up to date!".green());
        return;
    }

    println!("   {} stale dependencies:", plan.len());
    for (identity, update) in plan.iter() {
        let current = update.record.revision().unwrap_or("?");
        let note = if VersionComparator::is_newer(&update.latest_version, current) {
            ""
        } else {
            " (registry is behind the declared revision)"
        };
        println!(
            "   • {} {} → {}{}",
            identity.to_string().bright_cyan(),
            current.red(),
            update.latest_version.green(),
            note.dimmed()
        );
    }
}

fn print_summary(summary: &RunSummary) {
    println!("\n{}", "Summary".bold());
    println!(
        "   Manifests scanned:      {}{}",
        summary.manifests,
        if summary.unreadable_manifests > 0 {
            format!(" ({} unreadable)", summary.unreadable_manifests)
                .red()
                .to_string()
        } else {
            String::new()
        }
    );
    println!(
        "   Dependencies looked up: {} ({} resolved)",
        summary.looked_up, summary.resolved
    );
    println!("   Stale dependencies:     {}", summary.stale);
    println!(
        "   Pull requests opened:   {}",
        summary.upgrades.submitted.len().to_string().green()
    );
    println!("   Already open:           {}", summary.upgrades.already_open);

    let failures = summary.upgrades.failed + summary.failed_manifests;
    if failures > 0 {
        println!("   Failed:                 {}", failures.to_string().red());
    } else {
        println!("\n{}", "✨ Run complete!".green().bold());
    }
}
