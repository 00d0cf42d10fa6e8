use flowcheck_analyzer_error::{Result, compiler_error};
use flowcheck_analyzer_ir::*;
use rustc_hash::FxHashSet;

use super::call_graph::{CallGraph, build_call_graph};
use crate::config::{Config, ReachabilityMode};
use crate::report::DeadFuncReport;

/// State of one dead function elimination run over one module.
///
/// Built before the module is touched and consumed by [`DeadFuncContext::apply`],
/// so the call graph is never consulted after a function has been erased.
#[derive(Debug)]
pub struct DeadFuncContext {
    entry: FuncId,
    call_graph: CallGraph,
    dead_funcs: Vec<FuncId>,
}

impl DeadFuncContext {
    pub fn new(module: &Module, config: &Config) -> Result<Self> {
        let Some(entry) = module.func_by_name(&config.entry_name) else {
            return Err(compiler_error!(
                MissingEntry,
                "function @{} not found",
                config.entry_name
            ));
        };
        let call_graph = build_call_graph(module);
        let dead_funcs = find_dead_funcs(module, &call_graph, entry, config.reachability);
        Ok(Self {
            entry,
            call_graph,
            dead_funcs,
        })
    }

    pub fn entry(&self) -> FuncId {
        self.entry
    }

    pub fn call_graph(&self) -> &CallGraph {
        &self.call_graph
    }

    pub fn dead_funcs(&self) -> &[FuncId] {
        &self.dead_funcs
    }

    pub fn apply(self, module: &mut Module) -> DeadFuncReport {
        let entry = module.funcs[self.entry].name.clone();
        let undef = Operand::Const(Constant::Undef(Type::Ptr));

        let mut removed = Vec::new();
        for func_id in self.dead_funcs {
            // 先に参照をundefに置き換えてから消す
            let uses = module.replace_all_uses_of_func(func_id, &undef);
            if let Some(func) = module.remove_func(func_id) {
                log::debug!("removed {} ({} uses replaced)", func.name, uses);
                removed.push(func.name);
            }
        }

        DeadFuncReport {
            entry,
            removed,
            remaining: module.func_names(),
        }
    }
}

/// Functions to erase, in module order.
///
/// `TwoHop` keeps the entry, its direct callees and their direct callees.
/// `Transitive` keeps everything reachable over the call graph.
pub fn find_dead_funcs(
    module: &Module,
    call_graph: &CallGraph,
    entry: FuncId,
    mode: ReachabilityMode,
) -> Vec<FuncId> {
    let no_calls = Vec::new();
    let callees_of = |func_id: FuncId| call_graph.get(func_id).unwrap_or(&no_calls);

    let mut live = FxHashSet::default();
    live.insert(entry);
    match mode {
        ReachabilityMode::TwoHop => {
            let direct_callees = callees_of(entry);
            live.extend(direct_callees.iter().copied());
            for &callee in direct_callees {
                live.extend(callees_of(callee).iter().copied());
            }
        }
        ReachabilityMode::Transitive => {
            let mut worklist = vec![entry];
            while let Some(func_id) = worklist.pop() {
                for &callee in callees_of(func_id) {
                    if live.insert(callee) {
                        worklist.push(callee);
                    }
                }
            }
        }
    }

    module
        .funcs
        .keys()
        .filter(|func_id| !live.contains(func_id))
        .collect()
}

/// Removes the functions not reachable from the configured entry.
///
/// When the entry is missing the error is logged and returned, and the module
/// is left as it was.
pub fn eliminate_dead_funcs(module: &mut Module, config: &Config) -> Result<DeadFuncReport> {
    let ctx = match DeadFuncContext::new(module, config) {
        Ok(ctx) => ctx,
        Err(e) => {
            log::error!("{}", e);
            return Err(e);
        }
    };
    let report = ctx.apply(module);
    log::info!(
        "dead-func: removed {} functions, {} remaining",
        report.removed.len(),
        report.remaining.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_module;
    use flowcheck_analyzer_error::ErrorKind;

    const CHAIN: &str = r#"
define void @c() {
  ret void
}

define void @b() {
  call void @c()
  ret void
}

define void @a() {
  call void @b()
  ret void
}

define void @unused() {
  call void @a()
  ret void
}

define i32 @main() {
  call void @a()
  ret i32 0
}
"#;

    #[test]
    fn test_two_hop_retention() {
        let mut module = parse_module(CHAIN).unwrap();
        let report = eliminate_dead_funcs(&mut module, &Config::default()).unwrap();
        assert_eq!(report.entry, "main");
        assert_eq!(report.removed, vec!["c", "unused"]);
        assert_eq!(report.remaining, vec!["b", "a", "main"]);
    }

    #[test]
    fn test_transitive() {
        let mut module = parse_module(CHAIN).unwrap();
        let config = Config {
            reachability: ReachabilityMode::Transitive,
            ..Config::default()
        };
        let report = eliminate_dead_funcs(&mut module, &config).unwrap();
        assert_eq!(report.removed, vec!["unused"]);
        assert_eq!(report.remaining, vec!["c", "b", "a", "main"]);
    }

    #[test]
    fn test_missing_entry_is_noop() {
        let input = r#"
define void @f() {
  call void @g()
  ret void
}

define void @g() {
  ret void
}
"#;
        let mut module = parse_module(input).unwrap();
        let before = module.display().to_string();
        let e = eliminate_dead_funcs(&mut module, &Config::default()).unwrap_err();
        assert_eq!(e.kind, ErrorKind::MissingEntry);
        assert_eq!(module.display().to_string(), before);
        assert_eq!(module.func_names(), vec!["f", "g"]);
    }

    #[test]
    fn test_custom_entry() {
        let mut module = parse_module(CHAIN).unwrap();
        let config = Config {
            entry_name: "unused".to_string(),
            ..Config::default()
        };
        let report = eliminate_dead_funcs(&mut module, &config).unwrap();
        assert_eq!(report.removed, vec!["c", "main"]);
    }

    #[test]
    fn test_dangling_references_become_undef() {
        let mut module = parse_module(
            r#"
@table = global ptr @helper

define void @leaf() {
  ret void
}

define void @helper() {
  ret void
}

define void @mid() {
  call void @leaf()
  ret void
}

define void @top() {
  call void @mid()
  ret void
}

define i32 @main() {
  call void @top()
  %fp = alloca ptr
  store ptr @helper, ptr %fp
  ret i32 0
}
"#,
        )
        .unwrap();
        let ctx = DeadFuncContext::new(&module, &Config::default()).unwrap();
        let dead = ctx
            .dead_funcs()
            .iter()
            .map(|&id| module.funcs[id].name.clone())
            .collect::<Vec<_>>();
        assert_eq!(dead, vec!["leaf", "helper"]);

        let report = ctx.apply(&mut module);
        assert_eq!(report.remaining, vec!["mid", "top", "main"]);
        assert!(module.operands().all(|operand| operand.as_func().is_none_or(
            |func_id| module.funcs.contains_key(func_id)
        )));
        insta::assert_snapshot!(module.display().to_string(), @r"
        @table = global ptr undef

        define void @mid() {
        bb0:
          call void undef()
          ret void
        }

        define void @top() {
        bb0:
          call void @mid()
          ret void
        }

        define i32 @main() {
        bb0:
          call void @top()
          %fp = alloca ptr
          store ptr undef, ptr %fp
          ret i32 0
        }
        ");
    }
}
