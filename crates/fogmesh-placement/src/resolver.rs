//! Placement resolution engine.
//!
//! One call to [`Resolver::resolve`] goes through these steps:
//! 1. tokenize the application and infrastructure with a fresh symbol table,
//! 2. encode both as facts and run the solver against the mode's rule file,
//! 3. parse the candidates and reject infeasible answers,
//! 4. map tokens back to real ids,
//! 5. select the best candidate.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tracing::{debug, info};

use fogmesh_core::config::SolverConfig;
use fogmesh_core::*;

use crate::encoder::{LinkEncoding, encode_application, encode_infrastructure};
use crate::error::{PlacementError, PlacementResult};
use crate::select::select_best;
use crate::solver::{ProcessSolver, Solver, invoke, is_infeasible, parse_placements};
use crate::symbols::SymbolTable;

/// Anything able to turn an application and an infrastructure into a placement.
#[async_trait]
pub trait PlacementEngine: Send + Sync {
    async fn resolve(
        &self,
        mode: Mode,
        app: &Application,
        infra: &Infrastructure,
    ) -> PlacementResult<Placement>;
}

/// Rule files consulted by the solver, one per [`Mode`].
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub normal: PathBuf,
    pub heuristic: PathBuf,
}

impl RuleSet {
    pub fn from_config(config: &SolverConfig) -> Self {
        Self {
            normal: config.rules_path(Mode::Normal),
            heuristic: config.rules_path(Mode::Heuristic),
        }
    }

    pub fn path(&self, mode: Mode) -> &Path {
        match mode {
            Mode::Normal => &self.normal,
            Mode::Heuristic => &self.heuristic,
        }
    }

    /// Fail unless both rule files exist.
    pub fn verify(&self) -> PlacementResult<()> {
        for path in [&self.normal, &self.heuristic] {
            if !path.is_file() {
                return Err(PlacementError::Configuration(format!(
                    "rule file not found: {}",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

/// The solver-backed placement engine.
pub struct Resolver {
    solver: Arc<dyn Solver>,
    rules: RuleSet,
    links: LinkEncoding,
    /// Seeds per-resolution symbol tables and breaks ties.
    rng: Mutex<StdRng>,
}

impl Resolver {
    pub fn new(solver: Arc<dyn Solver>, rules: RuleSet, links: LinkEncoding) -> Self {
        Self {
            solver,
            rules,
            links,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Replace the random source, e.g. with a seeded one for reproducibility.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    /// Build a resolver backed by the solver process described in `config`.
    ///
    /// Fails if the solver executable or either rule file is missing.
    pub fn from_config(config: &SolverConfig) -> PlacementResult<Self> {
        let solver = ProcessSolver::locate(&config.executable, config.args.clone(), config.timeout())?;
        let rules = RuleSet::from_config(config);
        rules.verify()?;

        let links = LinkEncoding::from_flag(config.link_probability);
        info!(
            solver = %solver.executable().display(),
            normal = %rules.normal.display(),
            heuristic = %rules.heuristic.display(),
            links = ?links,
            "placement resolver ready"
        );
        Ok(Self::new(Arc::new(solver), rules, links))
    }

    pub fn link_encoding(&self) -> LinkEncoding {
        self.links
    }

    pub async fn resolve(
        &self,
        mode: Mode,
        app: &Application,
        infra: &Infrastructure,
    ) -> PlacementResult<Placement> {
        let mut table = SymbolTable::new(self.fork_rng());

        let safe_app = tokenize_application(app, &mut table);
        let safe_infra = tokenize_infrastructure(infra, &mut table);

        let app_facts = encode_application(&safe_app);
        let infra_facts = encode_infrastructure(&safe_infra, self.links);

        let output = invoke(
            self.solver.as_ref(),
            &app_facts,
            &infra_facts,
            self.rules.path(mode),
        )
        .await?;
        debug!(app = %app.id, %output, "solver raw output");

        let candidates = parse_placements(&output)?;
        if is_infeasible(&candidates) {
            return Err(PlacementError::NoFeasiblePlacement {
                application: app.id.clone(),
            });
        }

        let candidates = candidates
            .into_iter()
            .map(|p| detokenize(p, &table, infra))
            .collect::<PlacementResult<Vec<_>>>()?;

        info!(app = %app.id, %mode, candidates = candidates.len(), "solver produced placements");

        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        select_best(candidates, &mut *rng)
    }

    fn fork_rng(&self) -> StdRng {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        StdRng::seed_from_u64(rng.next_u64())
    }
}

#[async_trait]
impl PlacementEngine for Resolver {
    async fn resolve(
        &self,
        mode: Mode,
        app: &Application,
        infra: &Infrastructure,
    ) -> PlacementResult<Placement> {
        Resolver::resolve(self, mode, app, infra).await
    }
}

/// Copy of `app` with every identifier replaced by a token.
///
/// Images are not part of the solver problem and are left out.
fn tokenize_application<R: rand::Rng>(app: &Application, table: &mut SymbolTable<R>) -> Application {
    Application {
        id: table.add(&app.id),
        name: table.add(&app.name),
        services: app
            .services
            .iter()
            .map(|s| Service {
                id: table.add(&s.id),
                t_proc: s.t_proc,
                hw_reqs: s.hw_reqs,
                iot_reqs: table.add_all(&s.iot_reqs),
                sec_reqs: table.add_all(&s.sec_reqs),
                images: Vec::new(),
            })
            .collect(),
        flows: app
            .flows
            .iter()
            .map(|f| Flow {
                src: table.add(&f.src),
                dst: table.add(&f.dst),
                bandwidth: f.bandwidth,
            })
            .collect(),
        max_latencies: app
            .max_latencies
            .iter()
            .map(|l| MaxLatencyDescription {
                chain: table.add_all(&l.chain),
                value: l.value,
            })
            .collect(),
    }
}

fn tokenize_infrastructure<R: rand::Rng>(
    infra: &Infrastructure,
    table: &mut SymbolTable<R>,
) -> Infrastructure {
    Infrastructure {
        nodes: infra
            .nodes
            .iter()
            .map(|n| Node {
                id: table.add(&n.id),
                name: table.add(&n.name),
                address: table.add(&n.address),
                location: n.location,
                profiles: n
                    .profiles
                    .iter()
                    .map(|p| NodeProfile {
                        probability: p.probability,
                        hw_caps: p.hw_caps,
                        iot_caps: table.add_all(&p.iot_caps),
                        sec_caps: table.add_all(&p.sec_caps),
                    })
                    .collect(),
            })
            .collect(),
        links: infra
            .links
            .iter()
            .map(|l| Link {
                src: table.add(&l.src),
                dst: table.add(&l.dst),
                probability: l.probability,
                latency: l.latency,
                bandwidth: l.bandwidth,
            })
            .collect(),
    }
}

fn detokenize<R: rand::Rng>(
    placement: Placement,
    table: &SymbolTable<R>,
    infra: &Infrastructure,
) -> PlacementResult<Placement> {
    let assignments = placement
        .assignments
        .into_iter()
        .map(|a| {
            let service_id = lookup(table, &a.service_id)?;
            let node_id = lookup(table, &a.node_id)?;
            let node_name = infra
                .node(&node_id)
                .map(|n| n.name.clone())
                .unwrap_or_default();
            Ok(Assignment {
                service_id,
                node_id,
                node_name,
            })
        })
        .collect::<PlacementResult<Vec<_>>>()?;

    Ok(Placement {
        probability: placement.probability,
        assignments,
    })
}

fn lookup<R: rand::Rng>(table: &SymbolTable<R>, token: &str) -> PlacementResult<String> {
    table
        .get_by_token(token)
        .map(str::to_string)
        .ok_or_else(|| PlacementError::UnknownToken(token.to_string()))
}
