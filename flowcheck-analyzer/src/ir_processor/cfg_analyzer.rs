use flowcheck_analyzer_ir::*;
use rustc_hash::{FxHashMap, FxHashSet};
use vec_map::VecMap;

// switchで同じブロックに複数回飛ぶ場合は重複する
pub fn calc_predecessors(
    cfg: &VecMap<BasicBlockId, BasicBlock>,
) -> FxHashMap<BasicBlockId, Vec<BasicBlockId>> {
    let mut predecessors: FxHashMap<BasicBlockId, Vec<BasicBlockId>> = FxHashMap::default();
    for (id, block) in cfg.iter() {
        for successor in block.next.successors() {
            predecessors.entry(successor).or_default().push(id);
        }
    }
    predecessors
}

/// Blocks reachable from `entry_id` in reverse post-order.
pub fn calculate_rpo(
    cfg: &VecMap<BasicBlockId, BasicBlock>,
    entry_id: BasicBlockId,
) -> Vec<BasicBlockId> {
    let mut visited = FxHashSet::default();
    let mut postorder = Vec::new();

    dfs_postorder(entry_id, cfg, &mut visited, &mut postorder);

    postorder.reverse();
    postorder
}

fn dfs_postorder(
    current_id: BasicBlockId,
    cfg: &VecMap<BasicBlockId, BasicBlock>,
    visited: &mut FxHashSet<BasicBlockId>,
    postorder: &mut Vec<BasicBlockId>,
) {
    visited.insert(current_id);
    let Some(node) = cfg.get(current_id) else {
        return;
    };

    for successor in node.next.successors() {
        if !visited.contains(&successor) {
            dfs_postorder(successor, cfg, visited, postorder);
        }
    }

    // 帰りがけに追加
    postorder.push(current_id);
}
