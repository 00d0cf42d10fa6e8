use flowcheck_analyzer_ir::*;
use rustc_hash::FxHashSet;
use vec_map::VecMap;

/// Direct callees of every function, in the order the calls were found.
pub type CallGraph = VecMap<FuncId, Vec<FuncId>>;

/// Collects direct calls in the blocks reachable from the entry block.
///
/// The list keeps duplicates. Calls through a function pointer are skipped
/// and a declaration has no calls.
pub fn calls_in_func(func: &Func) -> Vec<FuncId> {
    let mut calls = Vec::new();
    let Some(entry) = func.entry_bb() else {
        return calls;
    };

    let mut visited = FxHashSet::default();
    let mut stack = vec![entry];
    while let Some(bb_id) = stack.pop() {
        if !visited.insert(bb_id) {
            continue;
        }
        let Some(bb) = func.bbs.get(bb_id) else {
            continue;
        };

        for instr in &bb.instrs {
            if let InstrKind::Call(call) = &instr.kind
                && let Some(callee) = call.direct_callee()
            {
                calls.push(callee);
            }
        }

        stack.extend(bb.next.successors());
    }
    calls
}

pub fn build_call_graph(module: &Module) -> CallGraph {
    let mut call_graph = CallGraph::new();
    for (func_id, func) in module.funcs.iter() {
        let calls = calls_in_func(func);
        log::debug!("{} calls {} functions", func.name, calls.len());
        call_graph.insert(func_id, calls);
    }
    call_graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_module;

    fn callee_names(module: &Module, call_graph: &CallGraph, name: &str) -> Vec<String> {
        let func_id = module.func_by_name(name).unwrap();
        call_graph[func_id]
            .iter()
            .map(|&callee| module.funcs[callee].name.clone())
            .collect()
    }

    #[test]
    fn test_direct_calls_only() {
        let module = parse_module(
            r#"
declare void @g()

define void @f() {
  %fp = alloca ptr
  store ptr @g, ptr %fp
  %p = load ptr, ptr %fp
  call void %p()
  ret void
}
"#,
        )
        .unwrap();
        let call_graph = build_call_graph(&module);
        assert!(callee_names(&module, &call_graph, "f").is_empty());
        assert!(callee_names(&module, &call_graph, "g").is_empty());
    }

    #[test]
    fn test_duplicates_and_unreachable_blocks() {
        let module = parse_module(
            r#"
declare void @a()
declare void @b()
declare void @c()

define void @f(i1 %cond) {
entry:
  call void @a()
  br i1 %cond, label %left, label %right
dead:
  call void @c()
  ret void
left:
  call void @b()
  br label %join
right:
  call void @a()
  br label %join
join:
  call void @b()
  ret void
}
"#,
        )
        .unwrap();
        let call_graph = build_call_graph(&module);
        // スタックなのでelse側のrightが先に処理される
        assert_eq!(
            callee_names(&module, &call_graph, "f"),
            vec!["a", "a", "b", "b"]
        );
    }
}
