// pass.rs — Pass descriptors and dependency resolution.
//
// Declares the compiler's semantic passes (parsing happens before the
// runner) and their dependency edges. The pipeline runs the minimal
// prefix needed for an `--emit` target.

use std::collections::HashSet;

/// Identifies each compiler pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassId {
    Managed,
    Embedded,
    Prune,
    Assemble,
}

/// Static metadata about a compiler pass.
pub struct PassDescriptor {
    /// Name used in log output.
    pub name: &'static str,
    pub inputs: &'static [PassId],
}

pub fn descriptor(id: PassId) -> PassDescriptor {
    match id {
        PassId::Managed => PassDescriptor {
            name: "managed",
            inputs: &[],
        },
        PassId::Embedded => PassDescriptor {
            name: "embedded",
            inputs: &[PassId::Managed],
        },
        PassId::Prune => PassDescriptor {
            name: "prune",
            inputs: &[PassId::Embedded],
        },
        PassId::Assemble => PassDescriptor {
            name: "assemble",
            inputs: &[PassId::Prune],
        },
    }
}

pub const ALL_PASSES: [PassId; 4] = [
    PassId::Managed,
    PassId::Embedded,
    PassId::Prune,
    PassId::Assemble,
];

/// Minimal ordered set of passes needed to produce `terminal`.
pub fn required_passes(terminal: PassId) -> Vec<PassId> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    visit(terminal, &mut visited, &mut order);
    order
}

fn visit(id: PassId, visited: &mut HashSet<PassId>, order: &mut Vec<PassId>) {
    if !visited.insert(id) {
        return;
    }
    for &dep in descriptor(id).inputs {
        visit(dep, visited, order);
    }
    order.push(id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prune_skips_assembly() {
        assert_eq!(
            required_passes(PassId::Prune),
            vec![PassId::Managed, PassId::Embedded, PassId::Prune]
        );
    }

    #[test]
    fn assemble_includes_all() {
        assert_eq!(required_passes(PassId::Assemble), ALL_PASSES.to_vec());
    }

    #[test]
    fn managed_is_minimal() {
        assert_eq!(required_passes(PassId::Managed), vec![PassId::Managed]);
    }

    #[test]
    fn passes_depend_on_their_predecessor() {
        for pair in ALL_PASSES.windows(2) {
            assert_eq!(descriptor(pair[1]).inputs, &[pair[0]]);
        }
        assert!(descriptor(PassId::Managed).inputs.is_empty());
    }
}
