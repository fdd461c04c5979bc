//! Per-session analysis and the multi-session run.
//!
//! ```text
//! Load → DetectOutliers → Filter (all trials) → GroupByCondition
//!      → for each tone: SelectValid → Mean → Spectrogram
//!      → Emit SessionResult
//! ```
//!
//! Sessions are independent and run in parallel; the only shared state is
//! the read-only [`Pipeline`] (configuration + designed filter).
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use ndarray::{Array1, Array2};
use rayon::prelude::*;

use crate::aggregate;
use crate::config::AnalysisConfig;
use crate::error::{LfpError, Result, Stage};
use crate::filter::{filter_trials, LowpassFilter};
use crate::outlier::screen_trials;
use crate::spectrogram::Spectrogram;

// ── Data model ───────────────────────────────────────────────────────────────

/// Stimulus label of a trial.  Totally ordered so it can key a map; `-0.0`
/// and `0.0` are the same tone.
#[derive(Debug, Clone, Copy)]
pub struct Tone(pub f64);

impl Tone {
    /// Label with signed zero folded to `0.0`.
    pub fn new(value: f64) -> Self {
        Self(if value == 0.0 { 0.0 } else { value })
    }
}

impl PartialEq for Tone {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Tone {}

impl PartialOrd for Tone {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tone {
    fn cmp(&self, other: &Self) -> Ordering {
        Tone::new(self.0).0.total_cmp(&Tone::new(other.0).0)
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One recording session: trials × samples plus one tone per trial.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub trials: Array2<f64>,
    pub tones: Array1<f64>,
}

impl Session {
    pub fn new(id: impl Into<String>, trials: Array2<f64>, tones: Array1<f64>) -> Result<Self> {
        let id = id.into();
        if tones.len() != trials.nrows() {
            return Err(LfpError::InvalidInput(format!(
                "session {id}: {} tone labels for {} trials",
                tones.len(),
                trials.nrows()
            )));
        }
        Ok(Self { id, trials, tones })
    }

    pub fn n_trials(&self) -> usize {
        self.trials.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.trials.ncols()
    }

    /// Distinct tones in ascending order.
    pub fn unique_tones(&self) -> Vec<Tone> {
        let mut tones: Vec<Tone> = self.tones.iter().map(|&t| Tone::new(t)).collect();
        tones.sort();
        tones.dedup();
        tones
    }
}

/// Anything that can hand out sessions by index.
pub trait SessionSource: Sync {
    fn n_sessions(&self) -> usize;

    fn load(&self, index: usize) -> Result<Session>;
}

/// Sessions already held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    sessions: Vec<Session>,
}

impl InMemorySource {
    pub fn new(sessions: Vec<Session>) -> Self {
        Self { sessions }
    }
}

impl SessionSource for InMemorySource {
    fn n_sessions(&self) -> usize {
        self.sessions.len()
    }

    fn load(&self, index: usize) -> Result<Session> {
        self.sessions.get(index).cloned().ok_or_else(|| {
            LfpError::InvalidInput(format!(
                "session index {index} out of range ({} sessions)",
                self.sessions.len()
            ))
        })
    }
}

/// Analysis output for one (session, tone) pair.  `n_trials` is never zero.
#[derive(Debug, Clone)]
pub struct ConditionResult {
    pub n_trials: usize,
    pub mean: Array1<f64>,
    pub spectrogram: Spectrogram,
}

/// Lowest- and highest-tone mean signals of a session.
#[derive(Debug, Clone)]
pub struct ToneContrast {
    pub low_tone: Tone,
    pub high_tone: Tone,
    pub low_mean: Array1<f64>,
    pub high_mean: Array1<f64>,
}

impl ToneContrast {
    /// `high_mean - low_mean`.
    pub fn difference(&self) -> Array1<f64> {
        &self.high_mean - &self.low_mean
    }
}

/// Analysis output for one session.
#[derive(Debug, Clone)]
pub struct SessionResult {
    pub index: usize,
    pub id: String,
    pub n_trials: usize,
    pub n_valid: usize,
    pub conditions: BTreeMap<Tone, ConditionResult>,
    /// Present when at least two tones kept valid trials.
    pub contrast: Option<ToneContrast>,
}

impl SessionResult {
    pub fn condition(&self, tone: f64) -> Option<&ConditionResult> {
        self.conditions.get(&Tone::new(tone))
    }
}

// ── Grouping ─────────────────────────────────────────────────────────────────

/// Partition trial indices by tone, keeping only trials with `valid[i]`.
///
/// Every distinct tone gets an entry, including tones whose trials were all
/// rejected (empty list).
pub fn group_by_condition(tones: &[f64], valid: &[bool]) -> Result<BTreeMap<Tone, Vec<usize>>> {
    if tones.len() != valid.len() {
        return Err(LfpError::InvalidInput(format!(
            "{} tone labels for a validity mask of {} trials",
            tones.len(),
            valid.len()
        )));
    }
    let mut groups: BTreeMap<Tone, Vec<usize>> = BTreeMap::new();
    for (i, (&tone, &ok)) in tones.iter().zip(valid).enumerate() {
        let group = groups.entry(Tone::new(tone)).or_default();
        if ok {
            group.push(i);
        }
    }
    Ok(groups)
}

// ── Pipeline ─────────────────────────────────────────────────────────────────

/// Validated configuration plus the filter designed from it.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: AnalysisConfig,
    filter: LowpassFilter,
}

impl Pipeline {
    /// Validate `config` and design the low-pass filter.  Configuration
    /// errors surface here, before any session is touched.
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        let filter = LowpassFilter::new(config.fs, config.lowpass_cutoff, config.filter_order)?;
        Ok(Self { config, filter })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn filter(&self) -> &LowpassFilter {
        &self.filter
    }

    /// Load and analyze every session of `source`, in parallel.
    ///
    /// Results come back in session-index order, one per session.  The first
    /// failing session aborts the run.
    pub fn run<S: SessionSource + ?Sized>(&self, source: &S) -> Result<Vec<SessionResult>> {
        let n = source.n_sessions();
        log::info!("analyzing {n} sessions");
        (0..n)
            .into_par_iter()
            .map(|index| {
                let session = source
                    .load(index)
                    .map_err(|e| e.at(&format!("#{index}"), Stage::Load, None))?;
                self.analyze_session(index, &session)
            })
            .collect()
    }

    /// Run every stage on one session.
    pub fn analyze_session(&self, index: usize, session: &Session) -> Result<SessionResult> {
        let cfg = &self.config;
        let id = session.id.as_str();
        let at = |stage: Stage, tone: Option<Tone>| move |e: LfpError| e.at(id, stage, tone);

        if session.tones.len() != session.n_trials() {
            return Err(LfpError::InvalidInput(format!(
                "{} tone labels for {} trials",
                session.tones.len(),
                session.n_trials()
            ))
            .at(id, Stage::Load, None));
        }
        log::debug!(
            "session {id}: {} trials × {} samples, {} tones",
            session.n_trials(),
            session.n_samples(),
            session.unique_tones().len()
        );

        let screen = screen_trials(
            &session.trials,
            cfg.fs,
            cfg.baseline_duration_sec,
            cfg.rms_threshold,
            cfg.ptp_threshold,
        )
        .map_err(at(Stage::DetectOutliers, None))?;
        let valid = screen.valid();
        let n_valid = screen.n_valid();

        let filtered = filter_trials(&session.trials, &self.filter).map_err(at(Stage::Filter, None))?;

        let tones: Vec<f64> = session.tones.iter().copied().collect();
        let groups = group_by_condition(&tones, &valid).map_err(at(Stage::GroupByCondition, None))?;

        let baseline_samples = cfg.baseline_samples();
        let mut conditions = BTreeMap::new();
        for (&tone, indices) in &groups {
            if indices.is_empty() {
                log::warn!("session {id}: tone {tone} has no valid trials, skipped");
                continue;
            }
            let mut mean = aggregate::mean(&filtered, indices).map_err(at(Stage::Mean, Some(tone)))?;
            if cfg.baseline_correct {
                mean = aggregate::baseline_correct(mean.view(), baseline_samples)
                    .map_err(at(Stage::Mean, Some(tone)))?;
            }
            let spectrogram = Spectrogram::from_config(&mean.to_vec(), cfg)
                .map_err(at(Stage::Spectrogram, Some(tone)))?;
            log::debug!(
                "session {id}: tone {tone}: {} trials, {}×{} spectrogram",
                indices.len(),
                spectrogram.n_freqs(),
                spectrogram.n_times()
            );
            conditions.insert(tone, ConditionResult { n_trials: indices.len(), mean, spectrogram });
        }

        let contrast = self
            .contrast(&filtered, &groups, &conditions)
            .map_err(at(Stage::Contrast, None))?;

        log::info!(
            "session {id}: {n_valid}/{} trials valid, {} conditions",
            session.n_trials(),
            conditions.len()
        );
        Ok(SessionResult {
            index,
            id: session.id.clone(),
            n_trials: session.n_trials(),
            n_valid,
            conditions,
            contrast,
        })
    }

    /// Lowest vs highest emitted tone of a session.
    fn contrast(
        &self,
        filtered: &Array2<f64>,
        groups: &BTreeMap<Tone, Vec<usize>>,
        conditions: &BTreeMap<Tone, ConditionResult>,
    ) -> Result<Option<ToneContrast>> {
        if conditions.len() < 2 {
            return Ok(None);
        }
        let (Some(&low_tone), Some(&high_tone)) = (conditions.keys().next(), conditions.keys().next_back())
        else {
            return Ok(None);
        };
        let (low_mean, high_mean) = aggregate::condition_means(
            filtered,
            &groups[&low_tone],
            &groups[&high_tone],
            self.config.baseline_correct,
            self.config.baseline_samples(),
        )?;
        Ok(Some(ToneContrast { low_tone, high_tone, low_mean, high_mean }))
    }
}

/// Build a [`Pipeline`] from `config` and run it over `source`.
pub fn run_pipeline<S: SessionSource + ?Sized>(
    source: &S,
    config: AnalysisConfig,
) -> Result<Vec<SessionResult>> {
    Pipeline::new(config)?.run(source)
}

/// Average of the low-tone means across sessions that have a contrast.
///
/// `None` when fewer than two sessions contribute.
pub fn low_tone_consistency(results: &[SessionResult]) -> Result<Option<Array1<f64>>> {
    let lows: Vec<Array1<f64>> = results
        .iter()
        .filter_map(|r| r.contrast.as_ref().map(|c| c.low_mean.clone()))
        .collect();
    if lows.len() < 2 {
        return Ok(None);
    }
    aggregate::session_average(&lows).map(Some)
}
