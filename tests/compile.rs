use cylang::{compile, compile_with, CompileOptions, ErrorKind, Severity};
use pretty_assertions::assert_eq;

const PROGRAMS: &[&str] = &[
    "",
    "let x = 1;",
    "const greeting = 'hi'; console.log(greeting + ' there');",
    "function fib(n) { if (n < 2) { return n; } return fib(n - 1) + fib(n - 2); } fib(10);",
    "let total = 0; for (let i = 0; i < 10; i++) { if (i % 2 === 0) continue; total += i; }",
    "let o = {a: 1, 'b c': [1, 2, {d: null}], 3: true}; for (const k in o) { console.log(k, o[k]); }",
    "let n = 3; do { n--; } while (n > 0);",
    "let r = 0; switch (r) { case 0: r = 1; break; case 1: { r = 2; } default: r = -r; }",
    "try { throw new Error('boom'); } catch (err) { console.log(err.message); } finally { console.log('done'); }",
    "let f = function fact(k) { return k <= 1 ? 1 : k * fact(k - 1); }; f(5);",
    "let a = 1, b = 2; a = b = (a + b) * (a - b) / -b;",
    "let a = 1; let t = typeof a === 'undefined' || !(a instanceof Object) && 'x' in {x: 1};",
    "let s = \"line\\nbreak\\t\\\"quoted\\\"\\u0007\";",
    "let m = new Array(3).length; let q = new Date().getTime(); m; q;",
    "let w = 0\nwhile (w < 3) w++\n;",
    "let v = [ , ].length; let sparse = [1, , 3, ,]; sparse;",
    "let i = 0, j = 10; for (i = 1, j = 9; i < j; i++, j--) { console.log((i, j)); }",
    "outer: for (let a = 0; a < 3; a++) { inner: for (let b = 0; b < 3; b++) { if (b > a) continue outer; if (a > 1) break inner; } }",
    "done: { if (Math.random() > 0.5) break done; console.log('half'); }",
    "let re = /ab+c[/\\]]/gi; let hits = 'abbc'.match(re); let half = hits.length / 2 / 1; half;",
    "if (true) /x/.test('x');",
    "for (const item of [1, 2, 3]) { console.log(item); } let seen = 0; for (seen of [4]) ;",
    "const add = (a, b) => a + b; const id = x => x; const make = () => ({k: 1}); add(id(1), make().k);",
    "const curry = a => b => { return a * b; }; console.log(curry(2)(3), [1, 2].map(n => (n, n * 2)));",
];

fn valid_programs() -> impl Iterator<Item = &'static str> {
    PROGRAMS.iter().copied()
}

#[test]
fn empty_input_compiles_to_empty_artifact() {
    let artifact = compile("", false, false).unwrap();
    assert_eq!(artifact.code, "");
    assert!(artifact.warnings.is_empty());
}

#[test]
fn unterminated_string_reports_opening_quote() {
    let diag = compile("let x = \"abc", false, false).unwrap_err();
    assert_eq!(diag.kind, ErrorKind::LexicalError);
    assert_eq!(diag.severity, Severity::Error);
    assert_eq!((diag.position.line, diag.position.column), (1, 9));
    assert_eq!(diag.position.offset, 8);
}

#[test]
fn duplicate_declaration_fails_in_both_modes() {
    for strict in [false, true] {
        let diag = compile("let x = 1; let x = 2;", strict, false).unwrap_err();
        assert_eq!(diag.kind, ErrorKind::NameResolutionError);
        assert_eq!(diag.position.column, 16);
    }
}

#[test]
fn use_before_declaration_depends_on_strictness() {
    let artifact = compile("x + 1; let x = 2;", false, false).unwrap();
    assert_eq!(artifact.code, "x+1;let x=2;");
    assert_eq!(artifact.warnings.len(), 1);
    assert_eq!(artifact.warnings[0].kind, ErrorKind::StrictModeViolation);
    assert_eq!(artifact.warnings[0].severity, Severity::Warning);

    let diag = compile("x + 1; let x = 2;", true, false).unwrap_err();
    assert_eq!(diag.kind, ErrorKind::StrictModeViolation);
    assert_eq!((diag.position.line, diag.position.column), (1, 1));
}

#[test]
fn pretty_and_compact_artifacts_reparse_equivalently() {
    for source in valid_programs() {
        let compact = compile(source, false, false).unwrap().code;
        let pretty = compile(source, false, true).unwrap().code;

        let from_pretty = compile(&pretty, false, false).unwrap().code;
        assert_eq!(compact, from_pretty, "source: {}", source);

        let from_compact = compile(&compact, false, false).unwrap().code;
        assert_eq!(compact, from_compact, "source: {}", source);
    }
}

#[test]
fn pretty_printing_is_idempotent() {
    for source in valid_programs() {
        let once = compile(source, false, true).unwrap().code;
        let twice = compile(&once, false, true).unwrap().code;
        assert_eq!(once, twice, "source: {}", source);
        assert!(once.is_empty() || once.ends_with('\n'));
    }
}

#[test]
fn strict_mode_is_monotonic() {
    let sources = PROGRAMS.iter().copied().chain([
        "x + 1; let x = 2;",
        "var legacy = 1;",
        "let a = 1\nlet b = a",
        "function f() { let unused = 1; } f();",
        "1 - 'one';",
        "missing();",
        "const c = 1; c++;",
        "break;",
        "let x = 1; let x = 2;",
        "let y = (;",
    ]);
    for source in sources {
        let standard = compile(source, false, false);
        let strict = compile(source, true, false);
        if standard.is_err() {
            assert!(strict.is_err(), "strict accepted what standard rejected: {}", source);
        }
        if let (Ok(standard), Ok(strict)) = (&standard, &strict) {
            assert_eq!(standard.code, strict.code);
            assert!(strict.warnings.is_empty());
        }
    }
}

#[test]
fn strict_promotes_every_warning() {
    let source = "var legacy = 1\nfunction f() { let unused = 1; } f();";
    let artifact = compile(source, false, false).unwrap();
    let kinds: Vec<_> = artifact.warnings.iter().map(|w| w.message.as_str()).collect();
    assert_eq!(
        kinds,
        vec![
            "`var` declarations are discouraged; use let or const",
            "Missing semicolon (automatically inserted)",
            "Unused binding: unused",
        ]
    );

    let diag = compile(source, true, false).unwrap_err();
    assert_eq!(diag.kind, ErrorKind::StrictModeViolation);
    assert_eq!(diag.position.offset, 0);
}

#[test]
fn semantic_errors_have_expected_kinds() {
    let cases = [
        ("missing();", ErrorKind::NameResolutionError),
        ("continue;", ErrorKind::SyntaxError),
        ("for (;;) { break nowhere; }", ErrorKind::SyntaxError),
        ("l: { continue l; }", ErrorKind::SyntaxError),
        ("(a, 1) => a;", ErrorKind::SyntaxError),
        ("let r = /open;", ErrorKind::LexicalError),
        ("let r = /x/q;", ErrorKind::LexicalError),
        ("try {} catch (e) { let e = 1; }", ErrorKind::NameResolutionError),
        ("let y = (;", ErrorKind::SyntaxError),
        ("let z = 1 @ 2;", ErrorKind::LexicalError),
        ("/* open", ErrorKind::LexicalError),
    ];
    for (source, kind) in cases {
        let diag = compile(source, false, false).unwrap_err();
        assert_eq!(diag.kind, kind, "source: {}", source);
    }
}

#[test]
fn assigning_a_constant_is_a_strict_finding() {
    for source in ["const c = 1; c += 1;", "undefined = 2;"] {
        let artifact = compile(source, false, false).unwrap();
        assert_eq!(artifact.warnings.len(), 1, "source: {}", source);
        assert_eq!(artifact.warnings[0].kind, ErrorKind::TypeError);
        assert_eq!(artifact.warnings[0].severity, Severity::Warning);

        let diag = compile(source, true, false).unwrap_err();
        assert_eq!(diag.kind, ErrorKind::TypeError);
        assert_eq!(diag.severity, Severity::Error);
    }
}

#[test]
fn unicode_space_and_line_terminators() {
    let artifact = compile("let\u{a0}a\u{feff}= 1\u{2028}let b = a\u{2029}b;", false, false).unwrap();
    assert_eq!(artifact.code, "let a=1;let b=a;b;");
    assert_eq!(artifact.warnings.len(), 2);
}

#[test]
fn first_error_by_position_is_reported() {
    let diag = compile("let a = 1;\nlet b = c;\nlet a = 2;", false, false).unwrap_err();
    assert_eq!(diag.kind, ErrorKind::NameResolutionError);
    assert_eq!((diag.position.line, diag.position.column), (2, 9));
    assert!(diag.message.contains('c'));
}

#[test]
fn newer_syntax_compiles_compactly() {
    let cases = [
        ("let v = [ , 1, , ];", "let v=[,1,,];"),
        ("let a = 0, b = (a++, a);", "let a=0,b=(a++,a);"),
        ("x: for (;;) { break x; }", "x:for(;;){break x;}"),
        ("for (const c of 'ab') console.log(c);", "for(const c of\"ab\")console.log(c);"),
        ("let r = 4 / 2 / /2/.source.length;", "let r=4/2/ /2/.source.length;"),
        ("let f = (p, q) => ({p: q});", "let f=(p,q)=>({p:q});"),
    ];
    for (source, expected) in cases {
        assert_eq!(compile(source, false, false).unwrap().code, expected, "source: {}", source);
    }
}

#[test]
fn pretty_output_shape() {
    let source = "function add(a,b){return a+b}\nlet r=add(1,2);if(r>2){console.log(r)}else console.log('small')";
    let expected = "\
function add(a, b) {
    return a + b;
}
let r = add(1, 2);
if (r > 2) {
    console.log(r);
} else
    console.log(\"small\");
";
    assert_eq!(compile(source, false, true).unwrap().code, expected);
}

#[test]
fn deep_nesting_is_bounded() {
    let depth = 10_000;
    let source = format!("let x = {}1{};", "(".repeat(depth), ")".repeat(depth));
    let limited = CompileOptions {
        max_depth: Some(48),
        ..CompileOptions::default()
    };
    let diag = compile_with(&source, &limited).unwrap_err();
    assert_eq!(diag.kind, ErrorKind::SyntaxError);
    assert!(diag.message.contains("Nesting too deep"));

    let shallow = format!("let x = {}1{};", "(".repeat(40), ")".repeat(40));
    assert_eq!(compile_with(&shallow, &limited).unwrap().code, "let x=1;");
}

/// Runs `f` on a thread with the stack size of a typical test thread
fn on_small_stack<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
    std::thread::Builder::new()
        .stack_size(2 * 1024 * 1024)
        .spawn(f)
        .unwrap()
        .join()
        .unwrap()
}

#[test]
fn default_options_reject_deep_nesting_without_overflow() {
    on_small_stack(|| {
        for source in [
            format!("let x = {}1{};", "[".repeat(300), "]".repeat(300)),
            format!("let x = {}1{};", "(".repeat(100_000), ")".repeat(100_000)),
            format!("{}x;{}", "{".repeat(1_000), "}".repeat(1_000)),
        ] {
            for strict in [false, true] {
                let diag = compile(&source, strict, false).unwrap_err();
                assert_eq!(diag.kind, ErrorKind::SyntaxError);
                assert!(diag.message.contains("Nesting too deep"));
            }
        }
    });
}

#[test]
fn default_options_accept_moderate_nesting() {
    on_small_stack(|| {
        let arrays = format!("let x = {}1{};", "[".repeat(100), "]".repeat(100));
        let compact = compile(&arrays, false, false).unwrap().code;
        assert_eq!(compact, format!("let x={}1{};", "[".repeat(100), "]".repeat(100)));
        assert!(compile(&arrays, true, true).is_ok());

        let mut chain = String::from("let n = 0; if (n === 0) { n = 1; }");
        for i in 1..100 {
            chain.push_str(&format!(" else if (n === {}) {{ n = {}; }}", i, i + 1));
        }
        let pretty = compile(&chain, false, true).unwrap().code;
        assert_eq!(compile(&pretty, false, true).unwrap().code, pretty);

        let functions = format!("{}{}", "(function () {".repeat(60), "})();".repeat(60));
        assert!(compile(&functions, false, false).is_ok());
    });
}

#[test]
fn long_flat_chains_are_bounded() {
    on_small_stack(|| {
        for source in [
            format!("let x = 1{};", "+1".repeat(200_000)),
            format!("let o = {{}}; o{};", ".a".repeat(200_000)),
            format!("let f = 0; f{};", "()".repeat(200_000)),
            format!("let b = 1{};", " && b".repeat(200_000)),
        ] {
            let diag = compile(&source, false, false).unwrap_err();
            assert_eq!(diag.kind, ErrorKind::SyntaxError, "chain starting {}", &source[..12]);
            assert!(diag.message.contains("Nesting too deep"));
        }

        let sum = format!("let x = 1{};", "+1".repeat(200));
        assert_eq!(
            compile(&sum, false, false).unwrap().code,
            format!("let x=1{};", "+1".repeat(200))
        );
        let path = format!("let o = {{}}; o{};", ".a".repeat(200));
        assert!(compile(&path, false, false).is_ok());

        // The comma operator builds a flat list, not a chain
        let commas = format!("let c = (1{});", ",1".repeat(100_000));
        assert!(compile(&commas, false, false).is_ok());
    });
}

#[test]
fn concurrent_compilations_are_independent() {
    let handles: Vec<_> = (0..8)
        .map(|i| {
            std::thread::spawn(move || {
                let source = format!("let v{} = {};", i, i);
                compile(&source, i % 2 == 0, i % 3 == 0).map(|a| a.code)
            })
        })
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        let code = handle.join().unwrap().unwrap();
        assert!(code.contains(&format!("v{}", i)));
    }
}

#[test]
fn diagnostics_serialize_for_bindings() {
    let diag = compile("let x = y;", true, false).unwrap_err();
    let json = serde_json::to_value(&diag).unwrap();
    assert_eq!(json["kind"], "NameResolutionError");
    assert_eq!(json["severity"], "error");
    assert_eq!(json["position"]["column"], 9);
    assert_eq!(json["code"], "E0003");
}
