use flowcheck_analyzer_error::Result;
use flowcheck_analyzer_ir::Module;

use crate::config::Config;
use crate::ir_processor::dead_func::eliminate_dead_funcs;
use crate::ir_processor::uninit::analyze_module;
use crate::ir_processor::verify::verify_module;
use crate::parser::parse_module;
use crate::report::{DeadFuncReport, UninitReport};

#[derive(Debug, Clone)]
pub struct Analyzer {
    config: Config,
}

impl Analyzer {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn load_module(&self, input: &str) -> Result<Module> {
        let module = parse_module(input)?;
        verify_module(&module)?;
        Ok(module)
    }

    /// Names anonymous allocas as a side effect.
    pub fn check_uninit(&self, module: &mut Module) -> Vec<UninitReport> {
        analyze_module(module, self.config.traversal)
    }

    pub fn eliminate_dead_funcs(&self, module: &mut Module) -> Result<DeadFuncReport> {
        let report = eliminate_dead_funcs(module, &self.config)?;
        verify_module(module)?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlatConfig;

    #[test]
    fn test_both_analyses_on_one_module() {
        let analyzer = Analyzer::new(Config::from(FlatConfig::default()));
        let mut module = analyzer
            .load_module(
                r#"
define void @unused() {
  %0 = alloca i32
  %v = load i32, ptr %0
  ret void
}

define i32 @main() {
  %x = alloca i32
  store i32 1, ptr %x
  %v = load i32, ptr %x
  ret i32 %v
}
"#,
            )
            .unwrap();

        let reports = analyzer.check_uninit(&mut module);
        assert_eq!(reports[0].uninit_vars, vec!["lvar_0"]);
        assert!(reports[1].uninit_vars.is_empty());

        let report = analyzer.eliminate_dead_funcs(&mut module).unwrap();
        assert_eq!(report.removed, vec!["unused"]);
        assert_eq!(report.remaining, vec!["main"]);
    }
}
