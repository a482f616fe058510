//! Contracting-chain assembly.
//!
//! For every target (a municipality or department the entity contracted
//! with) the target's own contracts are fetched and filtered, then each
//! entity contract with that target is matched against the target contracts
//! signed in the same year or later. Every non-self match of the entity
//! description becomes a [`ChainRecord`].

use std::time::Instant;

use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::config::ChainConfig;
use crate::contract::{ContractRecord, RawContract};
use crate::corpus::{DescriptionCorpus, Role};
use crate::error::{ChainError, Result};
use crate::matches::match_entity;
use crate::source::ContractSource;

/// One asserted link between an entity contract and a target contract.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainRecord {
    pub key: usize,
    pub entity: ContractRecord,
    pub target: ContractRecord,
    pub score: f64,
    pub valid: bool,
}

/// A scored pair that has not been keyed yet.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainLink {
    pub entity: ContractRecord,
    pub target: ContractRecord,
    pub score: f64,
}

/// Append-only table of chain records with strictly increasing keys.
#[derive(Debug, Clone, Default)]
pub struct ChainTable {
    records: Vec<ChainRecord>,
    next_key: usize,
}

impl ChainTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty table whose first record gets `key`.
    #[must_use]
    pub fn starting_at(key: usize) -> Self {
        Self {
            records: Vec::new(),
            next_key: key,
        }
    }

    /// Key `link`, mark it valid if its score is above `threshold`, append
    /// it and return its key.
    pub fn push(&mut self, link: ChainLink, threshold: f64) -> usize {
        let key = self.next_key;
        self.next_key += 1;
        self.records.push(ChainRecord {
            key,
            valid: link.score > threshold,
            score: link.score,
            entity: link.entity,
            target: link.target,
        });
        key
    }

    pub fn extend(&mut self, links: impl IntoIterator<Item = ChainLink>, threshold: f64) {
        for link in links {
            self.push(link, threshold);
        }
    }

    #[must_use]
    pub fn records(&self) -> &[ChainRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChainRecord> {
        self.records.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn valid_count(&self) -> usize {
        self.records.iter().filter(|r| r.valid).count()
    }

    #[must_use]
    pub fn into_records(self) -> Vec<ChainRecord> {
        self.records
    }
}

/// Target contracts an entity contract may be chained to: those signed in
/// `entity_year` or later, plus every contract without a year.
#[must_use]
pub fn eligible_candidates(
    target_contracts: &[ContractRecord],
    entity_year: Option<i32>,
) -> Vec<&ContractRecord> {
    target_contracts
        .iter()
        .filter(|contract| match (contract.year, entity_year) {
            (None, _) => true,
            (Some(year), Some(entity_year)) => year >= entity_year,
            (Some(_), None) => false,
        })
        .collect()
}

pub struct ChainAssembler<S> {
    source: S,
    config: ChainConfig,
}

impl<S: ContractSource> ChainAssembler<S> {
    pub fn new(source: S, config: ChainConfig) -> Self {
        Self { source, config }
    }

    #[must_use]
    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Build the chain for `targets` from the raw entity contracts.
    ///
    /// Entity contracts go through the eligibility rule first; they must
    /// carry the standardized target key in `counterparty_key`.
    ///
    /// # Errors
    /// Fails if the entity contracts themselves are malformed or the worker
    /// pool cannot be built. Problems with a single target are logged and
    /// that target is skipped.
    pub fn run<T>(&self, targets: &[T], entity_contracts: Vec<RawContract>) -> Result<ChainTable>
    where
        T: AsRef<str> + Sync,
    {
        let entity_contracts = self.config.eligibility.apply(entity_contracts)?;
        let mut table = ChainTable::new();
        self.run_into(targets, &entity_contracts, &mut table)?;
        Ok(table)
    }

    /// Like [`ChainAssembler::run`] for already filtered entity contracts,
    /// appending to an existing table.
    ///
    /// Targets are processed concurrently when `workers > 1`; their links
    /// are still appended in target order, so the table is the same as a
    /// sequential run.
    ///
    /// # Errors
    /// Only if the worker pool cannot be built.
    pub fn run_into<T>(
        &self,
        targets: &[T],
        entity_contracts: &[ContractRecord],
        table: &mut ChainTable,
    ) -> Result<()>
    where
        T: AsRef<str> + Sync,
    {
        let started = Instant::now();
        let before = table.len();

        if self.config.workers <= 1 {
            for (i, target) in targets.iter().enumerate() {
                let links = self.links_for_target(i, target.as_ref(), entity_contracts);
                table.extend(links, self.config.threshold);
            }
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.workers)
                .thread_name(|i| format!("chain-worker-{i}"))
                .build()
                .map_err(|e| ChainError::invalid("workers", e.to_string()))?;
            let batches: Vec<Vec<ChainLink>> = pool.install(|| {
                targets
                    .par_iter()
                    .enumerate()
                    .map(|(i, target)| self.links_for_target(i, target.as_ref(), entity_contracts))
                    .collect()
            });
            for links in batches {
                table.extend(links, self.config.threshold);
            }
        }

        let added = &table.records()[before..];
        info!(
            "Chain assembled for {} targets in {:.2?}: {} records, {} valid",
            targets.len(),
            started.elapsed(),
            added.len(),
            added.iter().filter(|r| r.valid).count()
        );
        Ok(())
    }

    fn links_for_target(
        &self,
        iteration: usize,
        target: &str,
        entity_contracts: &[ContractRecord],
    ) -> Vec<ChainLink> {
        if iteration % 10 == 0 {
            info!("Iteration # {iteration}; target: {target}");
        }
        match self.try_links_for_target(target, entity_contracts) {
            Ok(links) => links,
            Err(e) => {
                warn!("Skipping target {target}: {e}");
                Vec::new()
            }
        }
    }

    fn try_links_for_target(
        &self,
        target: &str,
        entity_contracts: &[ContractRecord],
    ) -> Result<Vec<ChainLink>> {
        let entity_rows: Vec<&ContractRecord> = entity_contracts
            .iter()
            .filter(|contract| contract.counterparty_key.as_deref() == Some(target))
            .collect();
        if entity_rows.is_empty() {
            debug!("No entity contracts tagged with {target}");
            return Ok(Vec::new());
        }

        let fetched = self.source.fetch(target, self.config.fetch_limit)?;
        if fetched.is_empty() {
            debug!("No contracts found for {target}");
            return Ok(Vec::new());
        }
        let target_contracts = self.config.eligibility.apply(fetched)?;
        if target_contracts.is_empty() {
            debug!("No eligible contracts for {target}");
            return Ok(Vec::new());
        }

        let mut links = Vec::new();
        for entity in entity_rows {
            links.extend(self.match_contract(entity, &target_contracts)?);
        }
        debug!("{target}: {} links", links.len());
        Ok(links)
    }

    /// Match one entity contract against a target's eligible contracts.
    ///
    /// # Errors
    /// Propagates vectorizer and similarity errors.
    pub fn match_contract(
        &self,
        entity: &ContractRecord,
        target_contracts: &[ContractRecord],
    ) -> Result<Vec<ChainLink>> {
        let candidates = eligible_candidates(target_contracts, entity.year);
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let corpus = DescriptionCorpus::from_raw(
            candidates.iter().map(|c| c.description.as_str()),
            &entity.description,
        );
        let matches = match_entity(
            &corpus,
            self.config.ngram_size,
            self.config.ntop,
            self.config.lower_bound,
        )?;

        let links = matches
            .into_iter()
            .filter(|m| !m.is_self_match())
            .filter_map(|m| match (corpus.role(m.left_idx), corpus.role(m.right_idx)) {
                (Some(Role::Entity), Some(Role::Candidate(i))) => Some(ChainLink {
                    entity: entity.clone(),
                    target: candidates[i].clone(),
                    score: m.score,
                }),
                _ => None,
            })
            .collect();
        Ok(links)
    }
}
