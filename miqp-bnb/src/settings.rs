//! Configuration settings for the workspace.
//!
//! Settings are a closed branch-and-bound structure plus one nested
//! structure per subsolver. Hosts hand them over as a flat option map:
//!
//! ```text
//! { "subsolver": "clarabel",
//!   "verbose": true,
//!   "timeLimit": 10.0,
//!   "clarabel.maxIter": 100 }
//! ```
//!
//! Keys prefixed with `<subsolver>.` configure the backend, all other keys
//! configure the search. Unknown keys are reported as warnings.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{BnbError, BnbResult};

/// Branch-and-bound settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BbSettings {
    // === Output ===
    /// Print progress information through the `log` facade.
    pub verbose: bool,

    /// Progress line every N processed nodes.
    pub log_frequency: u64,

    // === Workers ===
    /// Number of workers (1 = sequential, 0 = one per available core).
    pub num_processes: usize,

    /// Broadcast cutoff and best solution every N processed nodes.
    pub sync_frequency: u64,

    // === Tolerances ===
    /// Feasibility tolerance on bounds and constraints.
    pub primal_tolerance: f64,

    /// A discrete value is integral if within this distance of an integer.
    pub integer_tolerance: f64,

    /// Nodes with relaxation `>= cutoff - objective_tolerance` are pruned.
    pub objective_tolerance: f64,

    /// Stop when `objUpB - objLoB <= absolute_gap_tolerance`.
    pub absolute_gap_tolerance: f64,

    /// Stop when the relative gap is `<= relative_gap_tolerance`.
    pub relative_gap_tolerance: f64,

    // === Limits ===
    /// Wall-clock limit per `solve()` in seconds (None = unlimited).
    pub time_limit: Option<f64>,

    /// Maximum processed nodes per `solve()` (None = unlimited).
    pub iterations_limit: Option<u64>,

    /// Stop after this many solutions in total (None = unlimited).
    pub num_solutions_limit: Option<usize>,

    /// Initial cutoff: only solutions strictly better are of interest.
    pub objective_cutoff: Option<f64>,

    // === Modes ===
    /// Keep the frontier across tightening edits instead of restarting.
    pub dynamic_mode: bool,

    /// Return from `solve()` after each newly accepted solution.
    pub interactive_mode: bool,

    /// Re-relax the whole frontier right after tightening edits.
    pub eager_rebound: bool,
}

impl Default for BbSettings {
    fn default() -> Self {
        Self {
            verbose: false,
            log_frequency: 100,

            num_processes: 1,
            sync_frequency: 10,

            primal_tolerance: 1e-4,
            integer_tolerance: 1e-4,
            objective_tolerance: 1e-4,
            absolute_gap_tolerance: 1e-4,
            relative_gap_tolerance: 1e-6,

            time_limit: None,
            iterations_limit: None,
            num_solutions_limit: None,
            objective_cutoff: None,

            dynamic_mode: false,
            interactive_mode: false,
            eager_rebound: false,
        }
    }
}

impl BbSettings {
    /// Option names accepted by [`BbSettings`].
    pub const KEYS: &'static [&'static str] = &[
        "verbose",
        "logFrequency",
        "numProcesses",
        "syncFrequency",
        "primalTolerance",
        "integerTolerance",
        "objectiveTolerance",
        "absoluteGapTolerance",
        "relativeGapTolerance",
        "timeLimit",
        "iterationsLimit",
        "numSolutionsLimit",
        "objectiveCutoff",
        "dynamicMode",
        "interactiveMode",
        "eagerRebound",
    ];

    /// Create settings with verbose output enabled.
    pub fn verbose() -> Self {
        Self {
            verbose: true,
            log_frequency: 1,
            ..Self::default()
        }
    }

    /// Set time limit in seconds.
    pub fn with_time_limit(mut self, seconds: f64) -> Self {
        self.time_limit = Some(seconds);
        self
    }

    /// Set the node limit.
    pub fn with_iterations_limit(mut self, nodes: u64) -> Self {
        self.iterations_limit = Some(nodes);
        self
    }

    /// Set the solutions limit.
    pub fn with_num_solutions_limit(mut self, solutions: usize) -> Self {
        self.num_solutions_limit = Some(solutions);
        self
    }

    /// Set the number of workers.
    pub fn with_num_processes(mut self, workers: usize) -> Self {
        self.num_processes = workers;
        self
    }

    /// Seed the objective cutoff.
    pub fn with_objective_cutoff(mut self, cutoff: f64) -> Self {
        self.objective_cutoff = Some(cutoff);
        self
    }

    /// Keep the frontier across tightening edits.
    pub fn with_dynamic_mode(mut self, on: bool) -> Self {
        self.dynamic_mode = on;
        self
    }

    /// Return after every new solution.
    pub fn with_interactive_mode(mut self, on: bool) -> Self {
        self.interactive_mode = on;
        self
    }

    /// Re-relax the frontier eagerly after tightening edits.
    pub fn with_eager_rebound(mut self, on: bool) -> Self {
        self.eager_rebound = on;
        self
    }

    /// Resolve `num_processes` to an actual worker count.
    pub fn worker_count(&self) -> usize {
        match self.num_processes {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            n => n,
        }
    }
}

/// Settings of the Clarabel interior-point backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClarabelSettings {
    /// Print the solver's own iteration log.
    pub verbose: bool,

    /// Maximum interior-point iterations per relaxation.
    pub max_iter: u32,

    /// Time limit per relaxation in seconds.
    pub time_limit: f64,

    /// Feasibility tolerance.
    pub tol_feas: f64,

    /// Absolute duality gap tolerance.
    pub tol_gap_abs: f64,

    /// Relative duality gap tolerance.
    pub tol_gap_rel: f64,

    /// Enable data equilibration.
    pub equilibrate_enable: bool,
}

impl Default for ClarabelSettings {
    fn default() -> Self {
        Self {
            verbose: false,
            max_iter: 200,
            time_limit: f64::INFINITY,
            tol_feas: 1e-8,
            tol_gap_abs: 1e-8,
            tol_gap_rel: 1e-8,
            equilibrate_enable: true,
        }
    }
}

impl ClarabelSettings {
    /// Option names accepted after the `clarabel.` prefix.
    pub const KEYS: &'static [&'static str] = &[
        "verbose",
        "maxIter",
        "timeLimit",
        "tolFeas",
        "tolGapAbs",
        "tolGapRel",
        "equilibrateEnable",
    ];
}

/// Settings of the OSQP operator-splitting backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OsqpSettings {
    /// Print the solver's own iteration log.
    pub verbose: bool,

    /// Maximum ADMM iterations per relaxation.
    pub max_iter: u32,

    /// Absolute tolerance.
    pub eps_abs: f64,

    /// Relative tolerance.
    pub eps_rel: f64,

    /// Primal infeasibility tolerance.
    pub eps_prim_inf: f64,

    /// Dual infeasibility tolerance.
    pub eps_dual_inf: f64,

    /// ADMM step size.
    pub rho: f64,

    /// Run solution polishing.
    pub polish: bool,
}

impl Default for OsqpSettings {
    fn default() -> Self {
        Self {
            verbose: false,
            max_iter: 10_000,
            eps_abs: 1e-6,
            eps_rel: 1e-6,
            eps_prim_inf: 1e-6,
            eps_dual_inf: 1e-6,
            rho: 0.1,
            polish: true,
        }
    }
}

impl OsqpSettings {
    /// Option names accepted after the `osqp.` prefix.
    pub const KEYS: &'static [&'static str] = &[
        "verbose",
        "maxIter",
        "epsAbs",
        "epsRel",
        "epsPrimInf",
        "epsDualInf",
        "rho",
        "polish",
    ];
}

/// Backend-specific settings; the variant selects the subsolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "camelCase")]
pub enum SubsolverSettings {
    /// Clarabel interior-point method.
    Clarabel(ClarabelSettings),

    /// OSQP (requires the `osqp` cargo feature).
    Osqp(OsqpSettings),
}

impl Default for SubsolverSettings {
    fn default() -> Self {
        SubsolverSettings::Clarabel(ClarabelSettings::default())
    }
}

impl SubsolverSettings {
    /// Name used in option maps.
    pub fn name(&self) -> &'static str {
        match self {
            SubsolverSettings::Clarabel(_) => "clarabel",
            SubsolverSettings::Osqp(_) => "osqp",
        }
    }

    fn keys(&self) -> &'static [&'static str] {
        match self {
            SubsolverSettings::Clarabel(_) => ClarabelSettings::KEYS,
            SubsolverSettings::Osqp(_) => OsqpSettings::KEYS,
        }
    }

    /// Default settings of the named backend.
    pub fn for_name(name: &str) -> BnbResult<Self> {
        match name {
            "clarabel" => Ok(SubsolverSettings::Clarabel(ClarabelSettings::default())),
            "osqp" if cfg!(feature = "osqp") => Ok(SubsolverSettings::Osqp(OsqpSettings::default())),
            "osqp" => Err(BnbError::Configuration(
                "subsolver osqp is not available in this build (enable the `osqp` feature)"
                    .to_string(),
            )),
            "gurobi" | "qpalm" => Err(BnbError::Configuration(format!(
                "subsolver {} is not available in this build",
                name
            ))),
            other => Err(BnbError::Configuration(format!(
                "unknown subsolver: {}",
                other
            ))),
        }
    }

    fn with_options(&self, options: Map<String, Value>) -> BnbResult<Self> {
        let bad = |e: serde_json::Error| {
            BnbError::Configuration(format!("invalid {} option: {}", self.name(), e))
        };
        Ok(match self {
            SubsolverSettings::Clarabel(_) => {
                SubsolverSettings::Clarabel(serde_json::from_value(Value::Object(options)).map_err(bad)?)
            }
            SubsolverSettings::Osqp(_) => {
                SubsolverSettings::Osqp(serde_json::from_value(Value::Object(options)).map_err(bad)?)
            }
        })
    }
}

/// Complete workspace settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Search settings.
    pub bb: BbSettings,

    /// Subsolver selection and its settings.
    pub subsolver: SubsolverSettings,
}

impl Settings {
    /// Settings with the given search settings and the default subsolver.
    pub fn new(bb: BbSettings) -> Self {
        Self {
            bb,
            subsolver: SubsolverSettings::default(),
        }
    }

    /// Replace the subsolver settings.
    pub fn with_subsolver(mut self, subsolver: SubsolverSettings) -> Self {
        self.subsolver = subsolver;
        self
    }

    /// Parse a flat option map.
    ///
    /// Returns the settings and one warning per unrecognized key. A missing
    /// or unknown `subsolver` entry, or a known key with a value of the
    /// wrong type, is a configuration error.
    pub fn from_options(options: &Map<String, Value>) -> BnbResult<(Self, Vec<String>)> {
        let name = match options.get("subsolver") {
            Some(Value::String(s)) => s.as_str(),
            Some(other) => {
                return Err(BnbError::Configuration(format!(
                    "subsolver must be a string, got {}",
                    other
                )))
            }
            None => {
                return Err(BnbError::Configuration(
                    "no subsolver name provided".to_string(),
                ))
            }
        };
        let defaults = SubsolverSettings::for_name(name)?;
        let prefix = format!("{}.", name);

        let mut warnings = Vec::new();
        let mut bb_options = Map::new();
        let mut ss_options = Map::new();

        for (key, value) in options {
            if key == "subsolver" {
                continue;
            }
            if let Some(sub_key) = key.strip_prefix(&prefix) {
                if defaults.keys().contains(&sub_key) {
                    ss_options.insert(sub_key.to_string(), value.clone());
                } else {
                    warnings.push(format!("subsolver option not recognized: {}", sub_key));
                }
            } else if BbSettings::KEYS.contains(&key.as_str()) {
                bb_options.insert(key.clone(), value.clone());
            } else {
                warnings.push(format!("option not recognized: {}", key));
            }
        }

        let bb: BbSettings = serde_json::from_value(Value::Object(bb_options))
            .map_err(|e| BnbError::Configuration(format!("invalid option: {}", e)))?;
        let subsolver = defaults.with_options(ss_options)?;

        Ok((Self { bb, subsolver }, warnings))
    }

    /// Parse options given as a JSON object.
    pub fn from_json(options: &Value) -> BnbResult<(Self, Vec<String>)> {
        match options.as_object() {
            Some(map) => Self::from_options(map),
            None => Err(BnbError::Configuration(
                "options must be a JSON object".to_string(),
            )),
        }
    }
}
