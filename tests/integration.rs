//! Black-box integration tests driving whole programs through
//! `noxy::run_source` (spec §8 "Concrete scenarios" become the seed
//! integration suite here, per SPEC_FULL.md §E).
//!
//! Grounded on the style of `src/project/loader.rs`'s own
//! `#[cfg(test)] mod tests`: filesystem-backed scenarios use
//! `tempfile::tempdir`, everything else drives the pipeline from an inline
//! source string via `noxy::run_source`.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use noxy::error::NoxyError;
use noxy::RunOptions;

fn run(source: &str) -> Vec<String> {
    let (output, result) = noxy::run_source(source, PathBuf::from("."), RunOptions::default());
    result.unwrap_or_else(|e| panic!("{}", e.report(source)));
    output
}

fn run_err(source: &str) -> NoxyError {
    let (_, result) = noxy::run_source(source, PathBuf::from("."), RunOptions::default());
    result.expect_err("expected the program to fail")
}

#[test]
fn fibonacci_of_ten_is_fifty_five() {
    let src = r#"
func fib(n:int)->int
    if n<2 then return n else return fib(n-1)+fib(n-2) end
end
print(to_str(fib(10)))
"#;
    assert_eq!(run(src), vec!["55".to_string()]);
}

#[test]
fn struct_by_value_vs_by_ref_mutation() {
    let src = r#"
struct C valor:int end
func incC(c:C)->void
    c.valor = c.valor + 1
end
func incR(c: ref C)->void
    c.valor = c.valor + 1
end
let x: C = C(10)
incC(x)
print(to_str(x.valor))
incR(ref x)
print(to_str(x.valor))
"#;
    assert_eq!(run(src), vec!["10".to_string(), "11".to_string()]);
}

#[test]
fn fstring_width_precision_and_hex_specs() {
    let src = r#"
let n: int = 42
let p: float = 3.14159
print(f"{n:05} {n:x}")
print(f"{p:.2f}")
"#;
    assert_eq!(run(src), vec!["00042 2a".to_string(), "3.14".to_string()]);
}

#[test]
fn linked_list_traversal_yields_insertion_order() {
    let src = r#"
struct Node valor:int, proximo:ref Node end

let n3: Node = Node(3, null)
let n2: Node = Node(2, ref n3)
let n1: Node = Node(1, ref n2)

let results: int[] = zeros(0)
let cur: ref Node = ref n1
while cur != null do
    append(results, cur.valor)
    cur = cur.proximo
end
print(to_str(results))
"#;
    assert_eq!(run(src), vec!["[1, 2, 3]".to_string()]);
}

#[test]
fn quicksort_sorts_the_caller_array_through_a_ref_parameter() {
    let src = r#"
func partition(a: ref int[6], lo:int, hi:int) -> int
    let pivot: int = a[hi]
    let i: int = lo - 1
    let j: int = lo
    while j < hi do
        if a[j] < pivot then
            i = i + 1
            let tmp: int = a[i]
            a[i] = a[j]
            a[j] = tmp
        end
        j = j + 1
    end
    let tmp2: int = a[i + 1]
    a[i + 1] = a[hi]
    a[hi] = tmp2
    return i + 1
end

func quicksort(a: ref int[6], lo:int, hi:int) -> void
    if lo < hi then
        let p: int = partition(a, lo, hi)
        quicksort(a, lo, p - 1)
        quicksort(a, p + 1, hi)
    end
end

let a: int[6] = [10, 7, 8, 9, 1, 5]
quicksort(a, 0, 5)
print(to_str(a))
"#;
    assert_eq!(run(src), vec!["[1, 5, 7, 8, 9, 10]".to_string()]);
}

#[test]
fn quicksort_without_ref_leaves_the_caller_array_unsorted() {
    let src = r#"
func quicksort(a: int[6], lo:int, hi:int) -> void
    if lo < hi then
        let tmp: int = a[lo]
        a[lo] = a[hi]
        a[hi] = tmp
    end
end

let a: int[6] = [10, 7, 8, 9, 1, 5]
quicksort(a, 0, 5)
print(to_str(a))
"#;
    assert_eq!(run(src), vec!["[10, 7, 8, 9, 1, 5]".to_string()]);
}

#[test]
fn importing_a_module_brings_its_function_into_scope() {
    let dir = tempfile::tempdir().unwrap();
    let mut f = fs::File::create(dir.path().join("math.nx")).unwrap();
    f.write_all(b"func add(a:int, b:int) -> int return a + b end").unwrap();

    let (output, result) =
        noxy::run_source("use math select add\nprint(to_str(add(2, 3)))", dir.path().to_path_buf(), RunOptions::default());
    result.unwrap();
    assert_eq!(output, vec!["5".to_string()]);
}

#[test]
fn importing_the_same_module_twice_does_not_rerun_its_globals() {
    let dir = tempfile::tempdir().unwrap();
    let mut f = fs::File::create(dir.path().join("counter.nx")).unwrap();
    f.write_all(b"global hits: int = 0").unwrap();

    let (output, result) = noxy::run_source(
        "use counter select hits\nuse counter select hits\nprint(to_str(hits))",
        dir.path().to_path_buf(),
        RunOptions::default(),
    );
    result.unwrap();
    assert_eq!(output, vec!["0".to_string()]);
}

#[test]
fn division_by_zero_is_a_runtime_error_not_a_panic() {
    let err = run_err("print(to_str(1 / 0))");
    assert!(matches!(err, NoxyError::Runtime { .. }));
}

#[test]
fn out_of_bounds_index_is_a_runtime_error() {
    let err = run_err(r#"
let a: int[3] = [1, 2, 3]
print(to_str(a[3]))
"#);
    assert!(matches!(err, NoxyError::Runtime { .. }));
}

#[test]
fn negative_index_is_a_runtime_error() {
    let err = run_err(r#"
let a: int[3] = [1, 2, 3]
print(to_str(a[0 - 1]))
"#);
    assert!(matches!(err, NoxyError::Runtime { .. }));
}

#[test]
fn zeros_of_zero_yields_an_empty_fixed_array() {
    let src = "let a: int[0] = zeros(0)\nprint(to_str(a))";
    assert_eq!(run(src), vec!["[]".to_string()]);
}

#[test]
fn empty_fstring_is_the_empty_string() {
    let src = r#"print(f"")"#;
    assert_eq!(run(src), vec!["".to_string()]);
}

#[test]
fn short_circuit_and_skips_the_right_operand() {
    let src = r#"
func sideEffect() -> bool
    print("evaluated")
    return true
end
if false & sideEffect() then
end
"#;
    let output = run(src);
    assert!(output.is_empty(), "right operand of a false '&' must not be evaluated, got {output:?}");
}

#[test]
fn ref_equality_and_null_comparison() {
    let src = r#"
struct C valor:int end
let x: C = C(1)
let r1: ref C = ref x
let r2: ref C = ref x
print(to_str(r1 == r2))
let n: ref C = null
print(to_str(n == null))
n = r1
print(to_str(n == null))
"#;
    assert_eq!(run(src), vec!["true".to_string(), "true".to_string(), "false".to_string()]);
}
