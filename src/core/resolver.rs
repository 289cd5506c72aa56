//! Orders validated requests so that every same-run parent is attempted
//! before its dependents.
//!
//! References are looked up in a symbol table of the names defined in the
//! same input file. A reference written as `@name` must resolve inside the
//! file; a bare value that matches no row is treated as the id of an entity
//! that already exists remotely and is left for the API to check.

use crate::core::parser::ValidationError;
use crate::domain::model::{EntityKind, EntityRequest};
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};

/// Same-run references that loop back on themselves; fatal for the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CyclicDependency {
    pub lines: Vec<usize>,
}

/// Prefix marking a reference that must resolve to a row of the same file.
pub const SAME_RUN_PREFIX: char = '@';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentLink {
    /// The request has no parent.
    None,
    /// Parent is another valid row of this run, identified by its line.
    SameRun { source_line: usize },
    /// Parent is expected to exist remotely under this id.
    Remote { id: String },
    /// `@name` reference with no matching row.
    Unresolved { reference: String },
    /// Parent row exists but failed validation.
    Rejected { source_line: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRequest {
    pub request: EntityRequest,
    pub parent: ParentLink,
}

/// Requests in the order they must be executed.
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    pub steps: Vec<PlannedRequest>,
}

impl ExecutionPlan {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn position_of(&self, source_line: usize) -> Option<usize> {
        self.steps
            .iter()
            .position(|step| step.request.source_line == source_line)
    }
}

/// Names defined in this run, first definition wins.
struct SymbolTable {
    defined: HashMap<(EntityKind, String), usize>,
    rejected: HashMap<(EntityKind, String), usize>,
}

impl SymbolTable {
    fn build(requests: &[EntityRequest], rejected: &[ValidationError]) -> Self {
        let mut defined = HashMap::new();
        for request in requests {
            defined
                .entry((request.kind(), request.name.clone()))
                .or_insert(request.source_line);
        }

        let mut rejected_names = HashMap::new();
        for error in rejected {
            if let Some(kind) = error.declared_kind() {
                if !error.source.name.is_empty() {
                    rejected_names
                        .entry((kind, error.source.name.clone()))
                        .or_insert(error.source_line);
                }
            }
        }

        Self {
            defined,
            rejected: rejected_names,
        }
    }

    fn lookup(
        table: &HashMap<(EntityKind, String), usize>,
        kinds: &[EntityKind],
        name: &str,
    ) -> Option<usize> {
        kinds
            .iter()
            .find_map(|kind| table.get(&(*kind, name.to_string())).copied())
    }

    fn link_for(&self, request: &EntityRequest) -> ParentLink {
        let Some(reference) = request.parent_ref() else {
            return ParentLink::None;
        };
        let kinds = request.kind().parent_kinds();

        let (name, explicit) = match reference.strip_prefix(SAME_RUN_PREFIX) {
            Some(rest) => (rest.trim(), true),
            None => (reference, false),
        };

        if let Some(source_line) = Self::lookup(&self.defined, kinds, name) {
            return ParentLink::SameRun { source_line };
        }
        if let Some(source_line) = Self::lookup(&self.rejected, kinds, name) {
            return ParentLink::Rejected { source_line };
        }
        if explicit {
            ParentLink::Unresolved {
                reference: reference.to_string(),
            }
        } else {
            ParentLink::Remote {
                id: reference.to_string(),
            }
        }
    }
}

/// Stable topological order over same-run references.
///
/// Independent requests keep their input order; a dependent is moved just
/// far enough to follow its parent. Any cycle is fatal for the whole run.
pub fn resolve(
    requests: Vec<EntityRequest>,
    rejected: &[ValidationError],
) -> Result<ExecutionPlan, CyclicDependency> {
    let symbols = SymbolTable::build(&requests, rejected);
    let links: Vec<ParentLink> = requests.iter().map(|r| symbols.link_for(r)).collect();

    let position_by_line: HashMap<usize, usize> = requests
        .iter()
        .enumerate()
        .map(|(position, request)| (request.source_line, position))
        .collect();

    // parent position -> dependents' positions
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); requests.len()];
    let mut parent_of: Vec<Option<usize>> = vec![None; requests.len()];
    let mut ready = BinaryHeap::new();

    for (position, link) in links.iter().enumerate() {
        match link {
            ParentLink::SameRun { source_line } => {
                let parent = position_by_line[source_line];
                children[parent].push(position);
                parent_of[position] = Some(parent);
            }
            _ => ready.push(Reverse(position)),
        }
    }

    let mut order = Vec::with_capacity(requests.len());
    while let Some(Reverse(position)) = ready.pop() {
        order.push(position);
        for &child in &children[position] {
            ready.push(Reverse(child));
        }
    }

    if order.len() < requests.len() {
        let lines = find_cycle(&parent_of, &order, &requests);
        tracing::error!("❌ Cyclic dependency between lines {:?}", lines);
        return Err(CyclicDependency { lines });
    }

    let mut slots: Vec<Option<(EntityRequest, ParentLink)>> =
        requests.into_iter().zip(links).map(Some).collect();
    let steps = order
        .into_iter()
        .filter_map(|position| slots[position].take())
        .map(|(request, parent)| PlannedRequest { request, parent })
        .collect();

    Ok(ExecutionPlan { steps })
}

/// Walk parent pointers from the first unscheduled request until a node
/// repeats; the repeated segment is the cycle.
fn find_cycle(parent_of: &[Option<usize>], scheduled: &[usize], requests: &[EntityRequest]) -> Vec<usize> {
    let scheduled: BTreeSet<usize> = scheduled.iter().copied().collect();
    let Some(start) = (0..requests.len()).find(|p| !scheduled.contains(p)) else {
        return Vec::new();
    };

    let mut path = Vec::new();
    let mut current = start;
    loop {
        if let Some(index) = path.iter().position(|&p| p == current) {
            let mut lines: Vec<usize> = path[index..]
                .iter()
                .map(|&p: &usize| requests[p].source_line)
                .collect();
            lines.sort_unstable();
            return lines;
        }
        path.push(current);
        match parent_of[current] {
            Some(parent) => current = parent,
            None => return Vec::new(),
        }
    }
}
