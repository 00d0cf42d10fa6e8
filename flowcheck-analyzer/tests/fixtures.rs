use flowcheck_analyzer::report::{write_remaining, write_uninit_reports};
use flowcheck_analyzer::{Analyzer, Config, FlatConfig};

const TEST00: &str = include_str!("fixtures/test00.ll");
const TEST01: &str = include_str!("fixtures/test01.ll");

#[test]
fn test00_uninit() {
    let analyzer = Analyzer::new(Config::default());
    let mut module = analyzer.load_module(TEST00).unwrap();
    let reports = analyzer.check_uninit(&mut module);

    let mut out = String::new();
    write_uninit_reports(&mut out, &reports).unwrap();
    assert_eq!(
        out,
        "Function: test_c\n\
         Referenced uninitialized values:\n\
         \ttemp\n\
         \n\
         ---------------------\n\
         Function: main\n\
         ---------------------\n\
         Function: test_a\n\
         ---------------------\n\
         Function: test_b\n\
         ---------------------\n"
    );
}

#[test]
fn test00_nothing_is_dead() {
    let analyzer = Analyzer::new(Config::default());
    let mut module = analyzer.load_module(TEST00).unwrap();
    let report = analyzer.eliminate_dead_funcs(&mut module).unwrap();
    assert!(report.removed.is_empty());

    let mut out = String::new();
    write_remaining(&mut out, &report).unwrap();
    assert_eq!(out, "test_c\nmain\ntest_a\ntest_b\n");
}

#[test]
fn test01_two_hop() {
    let analyzer = Analyzer::new(Config::default());
    let mut module = analyzer.load_module(TEST01).unwrap();
    let report = analyzer.eliminate_dead_funcs(&mut module).unwrap();
    assert_eq!(report.removed, vec!["printf", "log_value", "orphan"]);
    insta::assert_snapshot!(module.display().to_string(), @r"
    @fmt = external global [4 x i8]

    define i32 @square(i32 %n) {
    entry:
      call void undef(i32 %n)
      %r = mul i32 %n, %n
      ret i32 %r
    }

    define i32 @compute(i32 %n) {
    entry:
      %s = call i32 @square(i32 %n)
      ret i32 %s
    }

    define i32 @main() {
    entry:
      %r = call i32 @compute(i32 4)
      %fp = alloca ptr
      store ptr undef, ptr %fp
      ret i32 %r
    }
    ");
}

#[test]
fn test01_transitive() {
    let analyzer = Analyzer::new(Config::from(FlatConfig {
        fixpoint: false,
        transitive: true,
    }));
    let mut module = analyzer.load_module(TEST01).unwrap();
    let report = analyzer.eliminate_dead_funcs(&mut module).unwrap();
    assert_eq!(report.removed, vec!["orphan"]);
    assert_eq!(
        report.remaining,
        vec!["printf", "log_value", "square", "compute", "main"]
    );
}

#[test]
fn test01_pruned_module_round_trips() {
    let analyzer = Analyzer::new(Config::default());
    let mut module = analyzer.load_module(TEST01).unwrap();
    analyzer.eliminate_dead_funcs(&mut module).unwrap();
    let printed = module.display().to_string();
    let reloaded = analyzer.load_module(&printed).unwrap();
    assert_eq!(reloaded.display().to_string(), printed);
}
