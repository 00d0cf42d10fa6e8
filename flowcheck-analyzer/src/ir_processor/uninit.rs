use flowcheck_analyzer_ir::*;
use rustc_hash::{FxHashMap, FxHashSet};
use vec_map::VecMap;

use super::cfg_analyzer::{calc_predecessors, calculate_rpo};
use super::init_lattice::{InitState, Lattice, merge_into};
use crate::config::TraversalMode;
use crate::report::UninitReport;

const ANONYMOUS_VAR_PREFIX: &str = "lvar_";

/// Gives every anonymous `alloca` a `lvar_N` name so it can be reported.
///
/// The counter is per function and skips names that are already taken.
pub fn name_anonymous_allocas(func: &mut Func) -> usize {
    let anonymous = func
        .bbs
        .values()
        .flat_map(|bb| bb.instrs.iter())
        .filter(|instr| matches!(instr.kind, InstrKind::Alloca(_)))
        .filter_map(|instr| instr.local)
        .filter(|&local| func.local_name(local).is_none())
        .collect::<Vec<_>>();

    let mut var_idx = 0;
    for &local in &anonymous {
        let name = loop {
            let name = format!("{}{}", ANONYMOUS_VAR_PREFIX, var_idx);
            var_idx += 1;
            if !func.has_local_named(&name) {
                break name;
            }
        };
        if let Some(local) = func.locals.get_mut(local) {
            local.name = Some(name);
        }
    }
    anonymous.len()
}

/// Per-function initialization analysis.
///
/// Lattices are stored per block and read back by successors; a predecessor
/// that has not been visited yet contributes nothing.
#[derive(Debug)]
pub struct InitAnalyzer<'a> {
    func: &'a Func,
    predecessors: FxHashMap<BasicBlockId, Vec<BasicBlockId>>,
    block_lattices: VecMap<BasicBlockId, Lattice>,
    pending: FxHashSet<LocalId>,
}

impl<'a> InitAnalyzer<'a> {
    pub fn new(func: &'a Func) -> Self {
        Self {
            func,
            predecessors: calc_predecessors(&func.bbs),
            block_lattices: VecMap::new(),
            pending: FxHashSet::default(),
        }
    }

    pub fn block_lattice(&self, bb_id: BasicBlockId) -> Option<&Lattice> {
        self.block_lattices.get(bb_id)
    }

    pub fn pending(&self) -> &FxHashSet<LocalId> {
        &self.pending
    }

    pub fn merged_predecessors(&self, bb_id: BasicBlockId) -> Lattice {
        let mut lattice = Lattice::default();
        for &pred in self.predecessors.get(&bb_id).into_iter().flatten() {
            if let Some(pred_lattice) = self.block_lattices.get(pred) {
                merge_into(&mut lattice, pred_lattice);
            }
        }
        lattice
    }

    // 定数・グローバル・引数、またはfloat/ptr/i8型の値
    fn is_trivial_value(&self, value: &Operand) -> bool {
        let is_param = value
            .as_local()
            .is_some_and(|local| self.func.is_param(local));
        if value.is_constant() || is_param {
            return true;
        }
        let typ = self.func.operand_type(value);
        typ.is_float() || typ.is_ptr() || typ.is_int(8)
    }

    fn transfer(&mut self, bb: &BasicBlock, lattice: &mut Lattice, record: bool) {
        for instr in &bb.instrs {
            match &instr.kind {
                InstrKind::Alloca(_) => {
                    if let Some(local) = instr.local {
                        lattice.insert(local, InitState::Unassigned);
                    }
                }
                InstrKind::Store { value, ptr } => {
                    if self.is_trivial_value(value)
                        && let Some(state) = ptr.as_local().and_then(|ptr| lattice.get_mut(&ptr))
                    {
                        *state = InitState::Assigned;
                    }
                }
                InstrKind::Load { ptr, .. } => {
                    if record
                        && let Some(ptr) = ptr.as_local()
                        && lattice
                            .get(&ptr)
                            .is_some_and(|&state| state != InitState::Assigned)
                    {
                        self.pending.insert(ptr);
                    }
                }
                InstrKind::BinOp { .. }
                | InstrKind::ICmp { .. }
                | InstrKind::FCmp { .. }
                | InstrKind::Cast { .. }
                | InstrKind::Phi { .. }
                | InstrKind::Select { .. }
                | InstrKind::GetElementPtr { .. }
                | InstrKind::ExtractValue { .. }
                | InstrKind::InsertValue { .. }
                | InstrKind::ExtractElement { .. }
                | InstrKind::InsertElement { .. }
                | InstrKind::Call(_) => {}
            }
        }
    }

    // 格子が変化したらtrue
    fn visit(&mut self, bb_id: BasicBlockId, record: bool) -> bool {
        let func = self.func;
        let Some(bb) = func.bbs.get(bb_id) else {
            return false;
        };
        let mut lattice = self.merged_predecessors(bb_id);
        self.transfer(bb, &mut lattice, record);

        if self.block_lattices.get(bb_id) == Some(&lattice) {
            return false;
        }
        log::debug!(
            "{}: {} tracks {} slots",
            func.name,
            bb_id,
            lattice.len()
        );
        self.block_lattices.insert(bb_id, lattice);
        true
    }

    fn solve(&mut self) {
        let func = self.func;
        let mut order = func
            .entry_bb()
            .map(|entry| calculate_rpo(&func.bbs, entry))
            .unwrap_or_default();
        let reachable = order.iter().copied().collect::<FxHashSet<_>>();
        order.extend(func.bbs.keys().filter(|bb_id| !reachable.contains(bb_id)));

        let mut iterations = 0;
        let mut changed = true;
        while changed {
            changed = false;
            iterations += 1;
            for &bb_id in &order {
                changed |= self.visit(bb_id, false);
            }
        }
        log::debug!(
            "{}: lattices converged after {} iterations",
            func.name,
            iterations
        );
    }

    pub fn run(&mut self, mode: TraversalMode) {
        self.pending.clear();
        self.block_lattices = VecMap::new();
        if mode == TraversalMode::Fixpoint {
            self.solve();
        }
        let func = self.func;
        for bb_id in func.bbs.keys() {
            self.visit(bb_id, true);
        }
    }

    /// Names of the slots read before being assigned, sorted.
    pub fn uninit_var_names(&self) -> Vec<String> {
        let mut names = self
            .pending
            .iter()
            .map(|&local| match self.func.local_name(local) {
                Some(name) => name.to_string(),
                None => usize::from(local).to_string(),
            })
            .collect::<Vec<_>>();
        names.sort();
        names
    }
}

pub fn analyze_func(func: &mut Func, mode: TraversalMode) -> UninitReport {
    let named = name_anonymous_allocas(func);
    if named > 0 {
        log::debug!("{}: named {} anonymous allocas", func.name, named);
    }

    let mut analyzer = InitAnalyzer::new(func);
    analyzer.run(mode);
    let uninit_vars = analyzer.uninit_var_names();

    UninitReport {
        func: func.id,
        func_name: func.name.clone(),
        uninit_vars,
    }
}

pub fn analyze_module(module: &mut Module, mode: TraversalMode) -> Vec<UninitReport> {
    let reports = module
        .funcs
        .values_mut()
        .map(|func| analyze_func(func, mode))
        .collect::<Vec<_>>();
    log::info!(
        "uninit: {} functions analyzed, {} with uninitialized reads",
        reports.len(),
        reports
            .iter()
            .filter(|report| !report.uninit_vars.is_empty())
            .count()
    );
    reports
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_module;

    fn uninit_vars(input: &str, mode: TraversalMode) -> Vec<String> {
        let mut module = parse_module(input).unwrap();
        let func = module.funcs.values_mut().last().unwrap();
        analyze_func(func, mode).uninit_vars
    }

    #[test]
    fn test_read_before_write() {
        let input = r#"
define void @f() {
  %v = alloca i32
  %t = load i32, ptr %v
  ret void
}
"#;
        assert_eq!(uninit_vars(input, TraversalMode::SinglePass), vec!["v"]);
    }

    #[test]
    fn test_no_false_positive() {
        let input = r#"
define void @f() {
  %v = alloca i32
  store i32 0, ptr %v
  %t = load i32, ptr %v
  ret void
}
"#;
        assert!(uninit_vars(input, TraversalMode::SinglePass).is_empty());
    }

    #[test]
    fn test_non_trivial_store_keeps_state() {
        let input = r#"
define void @f() {
  %x = alloca i32
  %y = alloca i32
  %t = load i32, ptr %y
  store i32 %t, ptr %x
  %u = load i32, ptr %x
  ret void
}
"#;
        assert_eq!(
            uninit_vars(input, TraversalMode::SinglePass),
            vec!["x", "y"]
        );
    }

    #[test]
    fn test_trivial_store_kinds() {
        let input = r#"
@g = global i32 7

define void @f(i32 %arg) {
  %a = alloca i32
  %b = alloca double
  %c = alloca ptr
  %d = alloca i8
  %e = alloca ptr
  store i32 %arg, ptr %a
  %sum = fadd double 1.0, 2.5
  store double %sum, ptr %b
  store ptr @g, ptr %c
  %byte = trunc i32 %arg to i8
  store i8 %byte, ptr %d
  store ptr null, ptr %e
  %ra = load i32, ptr %a
  %rb = load double, ptr %b
  %rc = load ptr, ptr %c
  %rd = load i8, ptr %d
  %re = load ptr, ptr %e
  ret void
}
"#;
        assert!(uninit_vars(input, TraversalMode::SinglePass).is_empty());
    }

    #[test]
    fn test_declaration_and_store_effects() {
        let module = parse_module(
            r#"
define void @f() {
entry:
  %x = alloca i32
  %y = alloca i32
  store i32 1, ptr %y
  ret void
}
"#,
        )
        .unwrap();
        let func = &module.funcs[FuncId::from(0)];
        let entry = func.entry_bb().unwrap();

        let mut analyzer = InitAnalyzer::new(func);
        assert!(analyzer.merged_predecessors(entry).is_empty());
        analyzer.run(TraversalMode::SinglePass);

        let lattice = analyzer.block_lattice(entry).unwrap();
        assert_eq!(lattice[&LocalId::from(0)], InitState::Unassigned);
        assert_eq!(lattice[&LocalId::from(1)], InitState::Assigned);
        assert!(analyzer.pending().is_empty());
    }

    #[test]
    fn test_branch_merge_conflict() {
        let partial = r#"
define i32 @f(i1 %c) {
entry:
  %x = alloca i32
  br i1 %c, label %then, label %join
then:
  store i32 1, ptr %x
  br label %join
join:
  %v = load i32, ptr %x
  ret i32 %v
}
"#;
        assert_eq!(uninit_vars(partial, TraversalMode::SinglePass), vec!["x"]);

        let both = r#"
define i32 @f(i1 %c) {
entry:
  %x = alloca i32
  br i1 %c, label %then, label %else
then:
  store i32 1, ptr %x
  br label %join
else:
  store i32 2, ptr %x
  br label %join
join:
  %v = load i32, ptr %x
  ret i32 %v
}
"#;
        assert!(uninit_vars(both, TraversalMode::SinglePass).is_empty());
    }

    #[test]
    fn test_single_pass_vs_fixpoint() {
        // useは両方の先行ブロックより前に並んでいる
        let input = r#"
define void @f(i1 %c) {
entry:
  %x = alloca i32
  br i1 %c, label %init, label %skip
use:
  %v = load i32, ptr %x
  ret void
init:
  store i32 1, ptr %x
  br label %use
skip:
  br label %use
}
"#;
        assert!(uninit_vars(input, TraversalMode::SinglePass).is_empty());
        assert_eq!(uninit_vars(input, TraversalMode::Fixpoint), vec!["x"]);
    }

    #[test]
    fn test_loop_back_edge() {
        let input = r#"
define void @f(i32 %n) {
entry:
  %i = alloca i32
  %acc = alloca i32
  store i32 0, ptr %i
  br label %head
head:
  %iv = load i32, ptr %i
  %c = icmp slt i32 %iv, %n
  br i1 %c, label %body, label %exit
body:
  %a = load i32, ptr %acc
  store i32 1, ptr %acc
  %next = add i32 %iv, 1
  store i32 %next, ptr %i
  br label %head
exit:
  ret void
}
"#;
        assert_eq!(uninit_vars(input, TraversalMode::SinglePass), vec!["acc"]);
        assert_eq!(uninit_vars(input, TraversalMode::Fixpoint), vec!["acc"]);
    }

    #[test]
    fn test_anonymous_allocas_are_named() {
        let mut module = parse_module(
            r#"
define void @f() {
  %0 = alloca i32
  %lvar_0 = alloca i32
  %1 = alloca i32
  store i32 0, ptr %1
  %t = load i32, ptr %0
  ret void
}

define void @g() {
  %0 = alloca i32
  ret void
}
"#,
        )
        .unwrap();
        let reports = analyze_module(&mut module, TraversalMode::SinglePass);
        assert_eq!(reports[0].uninit_vars, vec!["lvar_1"]);
        assert!(reports[1].uninit_vars.is_empty());

        let f = &module.funcs[FuncId::from(0)];
        assert_eq!(f.local_name(LocalId::from(0)), Some("lvar_1"));
        assert_eq!(f.local_name(LocalId::from(2)), Some("lvar_2"));
        let g = &module.funcs[FuncId::from(1)];
        assert_eq!(g.local_name(LocalId::from(0)), Some("lvar_0"));
    }

    #[test]
    fn test_declaration_has_empty_report() {
        let mut module = parse_module("declare i32 @puts(ptr)\n").unwrap();
        let reports = analyze_module(&mut module, TraversalMode::Fixpoint);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].func_name, "puts");
        assert!(reports[0].uninit_vars.is_empty());
    }
}
