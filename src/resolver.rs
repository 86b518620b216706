//! Links group references to their targets once the whole tree exists.
//!
//! A reference may appear before, after or inside the group it names, so the
//! parser leaves every reference slot empty and this pass fills them all.
//! Every target is looked up and checked before the first slot is written,
//! so a failed pass leaves the tree exactly as it found it.

use std::collections::HashMap;

use log::debug;

use crate::ast::{Alternation, Concatenation, Group, GroupReference, Matcher, ReferenceKey};
use crate::error::{Error, Result};

/// Targets chosen for references that are not bound yet.
type Plan = [(GroupReference, Group)];

/// Everything the linker needs, gathered in document order.
#[derive(Default)]
struct Declarations {
    groups: Vec<Group>,
    definitions: HashMap<String, Group>,
    duplicates: Vec<String>,
    references: Vec<GroupReference>,
}

impl Declarations {
    fn collect(&mut self, node: &Matcher) {
        match node {
            Matcher::Group(group) => self.groups.push(group.clone()),
            Matcher::GroupReferenceDefinition(definition) => {
                let name = definition.name().to_string();
                if self.definitions.contains_key(&name) {
                    self.duplicates.push(name);
                } else {
                    self.definitions.insert(name, definition.body().clone());
                }
            }
            Matcher::GroupReference(reference) => self.references.push(reference.clone()),
            _ => {}
        }
        for child in node.children() {
            self.collect(&child);
        }
    }

    fn target(&self, key: &ReferenceKey) -> Result<&Group> {
        let out_of_range = || {
            Error::reference(
                key,
                format!("only {} groups are declared", self.groups.len()),
            )
        };
        match key {
            ReferenceKey::Index(index) => self.groups.get(*index).ok_or_else(out_of_range),
            // Too many digits for an index.
            ReferenceKey::Name(name) if name.bytes().all(|b| b.is_ascii_digit()) => {
                Err(out_of_range())
            }
            ReferenceKey::Name(name) => self
                .definitions
                .get(&**name)
                .ok_or_else(|| Error::reference(key, "no definition with this name")),
        }
    }
}

/// Binds every unbound reference under `root`.
///
/// Numeric keys count all groups in document order, including the bodies of
/// definitions; names must match exactly one definition. References that are
/// already bound are left as they are. A reference that would call itself
/// again without consuming input (left recursion) is rejected.
pub(crate) fn resolve(root: &Alternation) -> Result<()> {
    let mut declarations = Declarations::default();
    declarations.collect(&Matcher::Alternation(root.clone()));

    if let Some(name) = declarations.duplicates.first() {
        return Err(Error::reference(name, "defined more than once"));
    }

    let mut plan: Vec<(GroupReference, Group)> = Vec::new();
    for reference in &declarations.references {
        if reference.is_bound() || plan.iter().any(|(planned, _)| planned.ptr_eq(reference)) {
            continue;
        }
        let target = declarations.target(reference.key())?;
        plan.push((reference.clone(), target.clone()));
    }

    for (reference, target) in &plan {
        if group_leads_with(target, reference, &plan, &mut Vec::new()) {
            return Err(Error::reference(
                reference.key(),
                "is left-recursive: it reaches itself before consuming any input",
            ));
        }
    }

    for (reference, target) in &plan {
        let owned = !reaches(target, reference, &plan);
        reference.bind_link(target, owned)?;
        debug!("bound group reference {reference} ({})", if owned { "owned" } else { "weak" });
    }
    Ok(())
}

fn planned_target(plan: &Plan, reference: &GroupReference) -> Option<Group> {
    plan.iter()
        .find(|(planned, _)| planned.ptr_eq(reference))
        .map(|(_, group)| group.clone())
        .or_else(|| reference.target())
}

fn visit(visited: &mut Vec<Group>, group: &Group) -> bool {
    if visited.iter().any(|seen| seen.ptr_eq(group)) {
        return false;
    }
    visited.push(group.clone());
    true
}

/// Whether matching `group` can get back to `reference`, following
/// references through their targets. A strong link from `reference` to such
/// a group would be a cycle.
pub(crate) fn reaches(group: &Group, reference: &GroupReference, plan: &Plan) -> bool {
    reaches_from(&Matcher::Group(group.clone()), reference, plan, &mut Vec::new())
}

fn reaches_from(
    node: &Matcher,
    reference: &GroupReference,
    plan: &Plan,
    visited: &mut Vec<Group>,
) -> bool {
    match node {
        Matcher::GroupReference(other) if other.ptr_eq(reference) => true,
        Matcher::GroupReference(other) => planned_target(plan, other)
            .is_some_and(|group| reaches_from(&Matcher::Group(group), reference, plan, visited)),
        Matcher::Group(group) if !visit(visited, group) => false,
        _ => node
            .children()
            .iter()
            .any(|child| reaches_from(child, reference, plan, visited)),
    }
}

/// Whether matching `group` at some offset can reach `reference` at that
/// same offset.
fn group_leads_with(
    group: &Group,
    reference: &GroupReference,
    plan: &Plan,
    visited: &mut Vec<Group>,
) -> bool {
    group.repetition().maximum() > 0
        && visit(visited, group)
        && alternation_leads_with(group.body(), reference, plan, visited)
}

fn alternation_leads_with(
    alternation: &Alternation,
    reference: &GroupReference,
    plan: &Plan,
    visited: &mut Vec<Group>,
) -> bool {
    alternation
        .children()
        .iter()
        .any(|choice| concatenation_leads_with(choice, reference, plan, visited))
}

fn concatenation_leads_with(
    concatenation: &Concatenation,
    reference: &GroupReference,
    plan: &Plan,
    visited: &mut Vec<Group>,
) -> bool {
    for child in concatenation.children() {
        if leads_with(child, reference, plan, visited) {
            return true;
        }
        if !nullable(child, plan, &mut Vec::new()) {
            return false;
        }
    }
    false
}

fn leads_with(
    node: &Matcher,
    reference: &GroupReference,
    plan: &Plan,
    visited: &mut Vec<Group>,
) -> bool {
    match node {
        Matcher::GroupReference(other) if other.ptr_eq(reference) => true,
        Matcher::GroupReference(other) => {
            other.repetition().maximum() > 0
                && planned_target(plan, other).is_some_and(|group| {
                    visit(visited, &group)
                        && alternation_leads_with(group.body(), reference, plan, visited)
                })
        }
        Matcher::Group(group) => group_leads_with(group, reference, plan, visited),
        Matcher::Concatenation(concatenation) => {
            concatenation_leads_with(concatenation, reference, plan, visited)
        }
        Matcher::Alternation(alternation) => {
            alternation_leads_with(alternation, reference, plan, visited)
        }
        Matcher::Expression(expression) => {
            alternation_leads_with(expression.root(), reference, plan, visited)
        }
        // Leaves call nothing; definitions are never entered in place.
        Matcher::Symbol(_)
        | Matcher::SymbolClass(_)
        | Matcher::Regex(_)
        | Matcher::GroupReferenceDefinition(_) => false,
    }
}

/// Whether `node` can succeed without consuming input.
fn nullable(node: &Matcher, plan: &Plan, visiting: &mut Vec<Group>) -> bool {
    match node {
        Matcher::Symbol(symbol) => symbol.repetition().minimum() == 0,
        Matcher::SymbolClass(class) => class.repetition().minimum() == 0,
        Matcher::Regex(leaf) => leaf.regex().is_match(""),
        Matcher::Concatenation(concatenation) => concatenation
            .children()
            .iter()
            .all(|child| nullable(child, plan, visiting)),
        Matcher::Alternation(alternation) => alternation_nullable(alternation, plan, visiting),
        Matcher::Group(group) => {
            group.repetition().minimum() == 0 || body_nullable(group, plan, visiting)
        }
        Matcher::GroupReference(reference) => {
            reference.repetition().minimum() == 0
                || planned_target(plan, reference)
                    .is_some_and(|group| body_nullable(&group, plan, visiting))
        }
        Matcher::GroupReferenceDefinition(_) => true,
        Matcher::Expression(expression) => {
            alternation_nullable(expression.root(), plan, visiting)
        }
    }
}

fn alternation_nullable(alternation: &Alternation, plan: &Plan, visiting: &mut Vec<Group>) -> bool {
    alternation.children().iter().any(|choice| {
        choice
            .children()
            .iter()
            .all(|child| nullable(child, plan, visiting))
    })
}

/// A body already being examined counts as consuming, which settles
/// recursive groups.
fn body_nullable(group: &Group, plan: &Plan, visiting: &mut Vec<Group>) -> bool {
    if visiting.iter().any(|seen| seen.ptr_eq(group)) {
        return false;
    }
    visiting.push(group.clone());
    let nullable = alternation_nullable(group.body(), plan, visiting);
    visiting.pop();
    nullable
}
