use std::fmt;

use flowcheck_analyzer_ir::FuncId;

pub const REPORT_SEPARATOR: &str = "---------------------";

/// Slots of one function that were read before being assigned on some path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UninitReport {
    pub func: FuncId,
    pub func_name: String,
    pub uninit_vars: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadFuncReport {
    pub entry: String,
    pub removed: Vec<String>,
    pub remaining: Vec<String>,
}

impl fmt::Display for UninitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Function: {}", self.func_name)?;
        if !self.uninit_vars.is_empty() {
            writeln!(f, "Referenced uninitialized values:")?;
            for var in &self.uninit_vars {
                writeln!(f, "\t{}", var)?;
            }
            writeln!(f)?;
        }
        writeln!(f, "{}", REPORT_SEPARATOR)
    }
}

pub fn write_uninit_reports(out: &mut impl fmt::Write, reports: &[UninitReport]) -> fmt::Result {
    for report in reports {
        write!(out, "{}", report)?;
    }
    Ok(())
}

pub fn write_remaining(out: &mut impl fmt::Write, report: &DeadFuncReport) -> fmt::Result {
    for name in &report.remaining {
        writeln!(out, "{}", name)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_uninit_reports() {
        let reports = vec![
            UninitReport {
                func: FuncId::from(0),
                func_name: "clean".to_string(),
                uninit_vars: vec![],
            },
            UninitReport {
                func: FuncId::from(1),
                func_name: "main".to_string(),
                uninit_vars: vec!["a".to_string(), "lvar_0".to_string()],
            },
        ];
        let mut out = String::new();
        write_uninit_reports(&mut out, &reports).unwrap();
        assert_eq!(
            out,
            "Function: clean\n---------------------\nFunction: main\nReferenced uninitialized values:\n\ta\n\tlvar_0\n\n---------------------\n"
        );
    }

    #[test]
    fn test_write_remaining() {
        let report = DeadFuncReport {
            entry: "main".to_string(),
            removed: vec!["dead".to_string()],
            remaining: vec!["helper".to_string(), "main".to_string()],
        };
        let mut out = String::new();
        write_remaining(&mut out, &report).unwrap();
        assert_eq!(out, "helper\nmain\n");
    }
}
