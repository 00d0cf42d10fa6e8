use rustc_hash::FxHashMap;
use strum_macros::Display;
use flowcheck_analyzer_ir::LocalId;

/// Initialization state of one stack slot at one program point.
///
/// `Bottom` is the identity of [`merge`]; two different non-`Bottom` states
/// merge to `Top`, so `Unassigned` and `Assigned` coming from different paths
/// do not collapse into either of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display)]
pub enum InitState {
    #[default]
    Bottom,
    Unassigned,
    Assigned,
    Top,
}

pub fn merge(s1: InitState, s2: InitState) -> InitState {
    match (s1, s2) {
        _ if s1 == s2 => s1,
        (InitState::Bottom, s) | (s, InitState::Bottom) => s,
        _ => InitState::Top,
    }
}

pub type Lattice = FxHashMap<LocalId, InitState>;

// 存在しないキーはBottomとして扱う
pub fn merge_into(dest: &mut Lattice, src: &Lattice) {
    for (&local, &state) in src {
        let entry = dest.entry(local).or_default();
        *entry = merge(*entry, state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [InitState; 4] = [
        InitState::Bottom,
        InitState::Unassigned,
        InitState::Assigned,
        InitState::Top,
    ];

    #[test]
    fn test_merge_identity() {
        for s in ALL {
            assert_eq!(merge(InitState::Bottom, s), s);
            assert_eq!(merge(s, InitState::Bottom), s);
        }
    }

    #[test]
    fn test_merge_idempotence() {
        for s in ALL {
            assert_eq!(merge(s, s), s);
        }
    }

    #[test]
    fn test_merge_conflict() {
        assert_eq!(
            merge(InitState::Unassigned, InitState::Assigned),
            InitState::Top
        );
        assert_eq!(
            merge(InitState::Assigned, InitState::Unassigned),
            InitState::Top
        );
        for s in ALL {
            assert_eq!(merge(InitState::Top, s), InitState::Top);
            assert_eq!(merge(s, InitState::Top), InitState::Top);
        }
    }

    #[test]
    fn test_merge_into() {
        let a = LocalId::from(0);
        let b = LocalId::from(1);
        let mut dest = Lattice::default();
        merge_into(&mut dest, &[(a, InitState::Assigned)].into_iter().collect());
        merge_into(
            &mut dest,
            &[(a, InitState::Unassigned), (b, InitState::Unassigned)]
                .into_iter()
                .collect(),
        );
        assert_eq!(dest.get(&a), Some(&InitState::Top));
        assert_eq!(dest.get(&b), Some(&InitState::Unassigned));
    }
}
