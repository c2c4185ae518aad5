//! End-to-end pipelines: paper reviews, AC decisions and acceptance.
//!
//! Each pipeline is a loop of independent conversations. Review
//! conversations are persisted as transcripts; decision conversations read
//! the metareviews back from those transcripts and append one batch at a
//! time to the decision store.

use std::rc::Rc;

use anyhow::{Context, Result};
use arena::participant::PAPER_EXTRACTOR_ID;
use arena::{
    load_metareview, papers_accepted, plan_batches, Arena, ArenaConfig, ArenaError, Conversation,
    DecisionBatchStore, ExperimentSetting, Observation, OutputLayout, Role, SeededRng, Transcript,
};
use tracing::{info, warn};

use crate::backend::ChatBackend;
use crate::config::RunArgs;
use crate::papers::{load_id2decision, TextDirSource};
use crate::players::AgentFactory;
use crate::prompts::PROMPT_VERSION;

/// Name of the reference experiment whose transcripts other runs reuse.
pub const BASELINE_EXPERIMENT: &str = "BASELINE";

/// Supplies the action for a participant played by a person.
pub trait HumanInput {
    fn prompt(&mut self, observation: &Observation) -> Result<String>;
}

/// Rejects every prompt. Used when no participant is human.
#[derive(Debug, Default)]
pub struct NoHumans;

impl HumanInput for NoHumans {
    fn prompt(&mut self, observation: &Observation) -> Result<String> {
        anyhow::bail!(
            "{} needs human input but no terminal is attached",
            observation.participant.id
        )
    }
}

/// Drive `arena` to its end, asking `human` whenever an agent hands the turn over.
pub fn drive(arena: &mut Arena, human: &mut dyn HumanInput) -> Result<()> {
    while !arena.is_terminal() {
        match arena.run() {
            Ok(summary) if summary.steps == 0 && !summary.terminal => {
                anyhow::bail!("conversation stalled at phase {}", arena.conversation().phase_index())
            }
            Ok(_) => {}
            Err(ArenaError::NeedsHumanInput { participant, phase }) => {
                info!(speaker = %participant, phase, "waiting for human input");
                loop {
                    let observation = arena.conversation().observation(&participant)?;
                    let action = human.prompt(&observation)?;
                    match arena.submit_human_action(&action) {
                        Ok(_) => break,
                        Err(ArenaError::InvalidAction { reason, .. }) => {
                            warn!(speaker = %participant, error = %reason, "please try again");
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// What a review run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewReport {
    /// Papers with a newly written transcript.
    pub reviewed: Vec<u64>,
    /// Papers whose transcript already existed.
    pub skipped: Vec<u64>,
    /// Papers resumed from a BASELINE transcript.
    pub resumed: Vec<u64>,
}

/// Phases 0-4 for every paper in the conference's `id2decision.json`.
pub fn run_paper_review(
    args: &RunArgs,
    backend: Rc<dyn ChatBackend>,
    human: &mut dyn HumanInput,
) -> Result<ReviewReport> {
    args.validate()?;
    let setting = args.setting()?;
    let layout = args.layout();
    let id2decision = load_id2decision(&args.data_dir, &args.conference)?;
    let source = Rc::new(TextDirSource::new(
        &args.data_dir,
        &args.conference,
        args.max_num_words,
    ));
    let factory = AgentFactory::new(backend, source, args.ac_scoring_method, args.acceptance_rate)
        .with_humans(args.humans.clone());

    info!(
        experiment = %setting.name,
        papers = id2decision.len(),
        reviewers = setting.num_reviewers(),
        prompt_version = PROMPT_VERSION,
        "starting paper reviews"
    );

    let mut report = ReviewReport::default();
    for (&paper_id, paper_decision) in &id2decision {
        let path = layout.transcript_path(&setting.name, paper_id);
        if path.exists() && !args.overwrite {
            info!(paper_id, path = %path.display(), "transcript exists, skipping");
            report.skipped.push(paper_id);
            continue;
        }

        let mut conversation = Conversation::review(setting.clone(), paper_id, paper_decision)?;
        let mut agents = factory.agents_for(&conversation);

        let baseline = layout.transcript_path(BASELINE_EXPERIMENT, paper_id);
        let resumable = setting.player_to_test() == Some(Role::AreaChair)
            && setting.name != BASELINE_EXPERIMENT
            && baseline.exists();
        if resumable {
            // Reviews and rebuttals are reused; only the metareview is rewritten.
            let observation = conversation.observation(PAPER_EXTRACTOR_ID)?;
            let text = agents
                .get_mut(PAPER_EXTRACTOR_ID)
                .context("no paper extractor agent")?
                .produce_action(&observation)?;
            conversation.step(PAPER_EXTRACTOR_ID, &text)?;
            let cached = Transcript::load(&baseline)
                .with_context(|| format!("failed to load {}", baseline.display()))?;
            conversation
                .resume_from_cache(&cached.messages)
                .with_context(|| format!("cannot resume paper {} from {}", paper_id, baseline.display()))?;
            report.resumed.push(paper_id);
        }

        let mut arena = Arena::new(conversation, agents, ArenaConfig::default())?;
        drive(&mut arena, human).with_context(|| format!("review of paper {} failed", paper_id))?;

        Transcript::from_conversation(arena.conversation())
            .with_prompt_version(PROMPT_VERSION)
            .save(&path, args.overwrite)?;
        info!(paper_id, messages = arena.conversation().log().len(), "paper reviewed");
        report.reviewed.push(paper_id);
    }
    Ok(report)
}

/// Metareview for `paper_id`, falling back to the BASELINE transcript.
fn metareview_for(
    layout: &OutputLayout,
    setting: &ExperimentSetting,
    paper_id: u64,
) -> Result<Option<String>> {
    if let Some(metareview) = load_metareview(&layout.transcript_path(&setting.name, paper_id))? {
        return Ok(Some(metareview));
    }
    if setting.name == BASELINE_EXPERIMENT {
        return Ok(None);
    }
    let fallback = load_metareview(&layout.transcript_path(BASELINE_EXPERIMENT, paper_id))?;
    if fallback.is_some() {
        info!(paper_id, "using BASELINE metareview");
    }
    Ok(fallback)
}

/// What a decision run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecisionReport {
    /// Batches decided in this run.
    pub batches: usize,
    /// Papers left out for lack of a metareview.
    pub excluded: Vec<u64>,
    /// Batches in the store after the run.
    pub stored_batches: usize,
}

/// Phase 5 over every paper with a metareview and no decision yet.
pub fn run_paper_decision(
    args: &RunArgs,
    backend: Rc<dyn ChatBackend>,
    human: &mut dyn HumanInput,
) -> Result<DecisionReport> {
    args.validate()?;
    let setting = args.setting()?;
    let layout = args.layout();
    let scoring = args.ac_scoring_method;
    let store_path = layout.decision_path(scoring, &setting.name);
    let mut store = DecisionBatchStore::load(&store_path, args.num_papers_per_area_chair)?;

    let mut paper_ids: Vec<u64> = load_id2decision(&args.data_dir, &args.conference)?
        .into_keys()
        .collect();
    SeededRng::new(args.seed).shuffle(&mut paper_ids);
    let decided = store.decided_papers();
    paper_ids.retain(|id| !decided.contains(id));

    let mut report = DecisionReport::default();
    let mut candidates = Vec::with_capacity(paper_ids.len());
    for paper_id in paper_ids {
        match metareview_for(&layout, &setting, paper_id)? {
            Some(metareview) => candidates.push((paper_id, metareview)),
            None => {
                warn!(paper_id, "no metareview, excluding paper");
                report.excluded.push(paper_id);
            }
        }
    }

    let source = Rc::new(TextDirSource::new(
        &args.data_dir,
        &args.conference,
        args.max_num_words,
    ));
    let factory = AgentFactory::new(backend, source, scoring, args.acceptance_rate)
        .with_humans(args.humans.clone());

    let batches = plan_batches(&candidates, args.num_papers_per_area_chair);
    info!(
        experiment = %setting.name,
        candidates = candidates.len(),
        batches = batches.len(),
        already_decided = decided.len(),
        prompt_version = PROMPT_VERSION,
        "starting AC decisions"
    );

    for (index, batch) in batches.into_iter().enumerate() {
        let (ids, metareviews): (Vec<u64>, Vec<String>) = batch.into_iter().unzip();
        let conversation = Conversation::decision(setting.clone(), ids.clone(), metareviews, scoring)?;
        let agents = factory.agents_for(&conversation);
        let mut arena = Arena::new(conversation, agents, ArenaConfig::default())?;
        drive(&mut arena, human).with_context(|| format!("decision batch {} failed", index))?;

        let record = arena
            .conversation()
            .ac_decisions()
            .cloned()
            .unwrap_or_default();
        if record.len() != ids.len() {
            warn!(
                batch = index,
                decided = record.len(),
                assigned = ids.len(),
                "AC did not decide every paper of the batch"
            );
        }
        store.push(record)?;
        store
            .save(&store_path)
            .with_context(|| format!("failed to save {}", store_path.display()))?;
        report.batches += 1;
    }

    report.stored_batches = store.len();
    Ok(report)
}

/// Papers accepted from the stored decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptReport {
    pub total: usize,
    pub accepted: Vec<u64>,
}

pub fn run_accept(args: &RunArgs) -> Result<AcceptReport> {
    args.validate()?;
    let setting = args.setting()?;
    let scoring = args.ac_scoring_method;
    let path = args.layout().decision_path(scoring, &setting.name);
    let store = DecisionBatchStore::load(&path, args.num_papers_per_area_chair)?;

    let mut rng = SeededRng::new(args.seed);
    let accepted = papers_accepted(store.batches(), args.acceptance_rate, scoring, Some(&mut rng))
        .with_context(|| format!("cannot compute acceptances from {}", path.display()))?;
    let total = store.batches().iter().map(|b| b.len()).sum();
    info!(total, accepted = accepted.len(), "acceptance computed");
    Ok(AcceptReport { total, accepted })
}
