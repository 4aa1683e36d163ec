//! The evaluator: special forms, procedure application, proper tail calls.
//!
//! Evaluation is a loop over a current expression and environment. Forms
//! whose value is the value of a sub-expression in tail position (`if`
//! branches, the last form of `begin`, `and`, `or`, and procedure bodies)
//! replace the current expression and environment and go around the loop
//! again instead of recursing. Only operands, tests and other non-tail
//! sub-expressions recurse, and that nesting is bounded by
//! [`MAX_EVAL_DEPTH`].

use std::collections::HashSet;
use std::io;
use std::panic;
use std::rc::Rc;
use std::thread;

use crate::ast::{Params, Procedure, Value, sym, val};
use crate::builtinops::{Builtin, get_builtin_ops};
use crate::environment::Environment;
use crate::mathlib::CONSTANTS;
use crate::printer::print;
use crate::{EVAL_STACK_SIZE, Error, MAX_EVAL_DEPTH};

/// Create the global environment with every builtin and math constant bound
pub fn standard_environment() -> Environment {
    let env = Environment::new();
    for op in get_builtin_ops() {
        env.define(op.id, Value::Builtin(Rc::new(Builtin::from(op))));
    }
    for (name, value) in CONSTANTS {
        env.define(name, val(value));
    }
    env
}

/// Evaluate an expression in the given environment
pub fn eval(expr: &Value, env: &Environment) -> Result<Value, Error> {
    eval_with_depth(expr, env, 0)
}

/// Call a procedure or builtin with already-evaluated arguments
pub fn apply(callee: &Value, args: Vec<Value>) -> Result<Value, Error> {
    call_procedure(callee, args, 0)
}

/// Run `task` on a new thread whose stack holds [`MAX_EVAL_DEPTH`] nested
/// evaluations. Values are not `Send`, so `task` builds its own environment.
/// A panic in `task` resumes on the calling thread.
pub fn with_eval_stack<T, F>(task: F) -> io::Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let handle = thread::Builder::new()
        .name("lispy-eval".to_owned())
        .stack_size(EVAL_STACK_SIZE)
        .spawn(task)?;
    match handle.join() {
        Ok(value) => Ok(value),
        Err(payload) => panic::resume_unwind(payload),
    }
}

/// Call `callee` from host code running at `depth`, e.g. a higher-order builtin
pub(crate) fn call_procedure(
    callee: &Value,
    args: Vec<Value>,
    depth: usize,
) -> Result<Value, Error> {
    match callee {
        Value::Procedure(procedure) => {
            let env = Environment::for_call(&procedure.params, args, &procedure.env)?;
            eval_with_depth(&procedure.body, &env, depth + 1)
        }
        Value::Builtin(builtin) => builtin.invoke(&args, depth),
        other => Err(Error::NotCallable(print(other))),
    }
}

fn depth_exceeded() -> Error {
    Error::EvalError(format!(
        "Evaluation depth limit exceeded (max: {MAX_EVAL_DEPTH})"
    ))
}

/// Evaluate an S-expression with depth tracking to prevent stack overflow
fn eval_with_depth(expr: &Value, env: &Environment, depth: usize) -> Result<Value, Error> {
    if depth >= MAX_EVAL_DEPTH {
        return Err(depth_exceeded());
    }

    let mut expr = expr.clone();
    let mut env = env.clone();

    loop {
        let elements = match &expr {
            Value::Symbol(name) => return env.lookup(name),
            Value::List(elements) => elements.clone(),
            other => return Ok(other.clone()),
        };
        let Some((head, operands)) = elements.split_first() else {
            return Err(Error::EvalError("Cannot evaluate empty list".into()));
        };

        if let Value::Symbol(keyword) = head {
            match keyword.as_str() {
                "quote" => return eval_quote(operands, &expr),
                "quasiquote" => return eval_quasiquote(operands, &env, depth, &expr),
                "define" => return eval_define(operands, &env, depth, &expr),
                "set!" => return eval_set(operands, &env, depth, &expr),
                "lambda" => return eval_lambda(operands, &env, &expr),
                "if" => {
                    expr = eval_if(operands, &env, depth, &expr)?;
                    continue;
                }
                "begin" => {
                    expr = eval_begin(operands, &env, depth)?;
                    continue;
                }
                "and" | "or" => match eval_logical(keyword == "and", operands, &env, depth)? {
                    Step::Return(value) => return Ok(value),
                    Step::Tail(next) => {
                        expr = next;
                        continue;
                    }
                },
                _ => {}
            }
        }

        // Application
        let callee = eval_with_depth(head, &env, depth + 1)?;
        let args = eval_args(operands, &env, depth + 1)?;
        match callee {
            Value::Procedure(procedure) => {
                env = Environment::for_call(&procedure.params, args, &procedure.env)
                    .map_err(|err| name_arity_error(err, head))?;
                expr = procedure.body.clone();
            }
            Value::Builtin(builtin) => return builtin.invoke(&args, depth),
            other => return Err(Error::NotCallable(print(&other))),
        }
    }
}

/// Attach the called expression to an arity error that lacks one
fn name_arity_error(err: Error, callee: &Value) -> Error {
    match err {
        Error::ArityError {
            expected,
            got,
            expression: None,
        } => Error::arity_error_with_expr(expected, got, print(callee)),
        other => other,
    }
}

/// Helper function to evaluate a list of argument expressions with depth tracking
fn eval_args(args: &[Value], env: &Environment, depth: usize) -> Result<Vec<Value>, Error> {
    args.iter()
        .map(|arg| eval_with_depth(arg, env, depth))
        .collect()
}

fn malformed(message: impl Into<String>, form: &Value) -> Error {
    Error::malformed(message, print(form))
}

fn eval_quote(operands: &[Value], form: &Value) -> Result<Value, Error> {
    match operands {
        [datum] => Ok(datum.clone()),
        _ => Err(malformed(
            format!("quote: expected exactly 1 operand, got {}", operands.len()),
            form,
        )),
    }
}

/// The branch to continue with; `Unspecified` when the test fails and there
/// is no alternate.
fn eval_if(
    operands: &[Value],
    env: &Environment,
    depth: usize,
    form: &Value,
) -> Result<Value, Error> {
    let (test, consequent, alternate) = match operands {
        [test, consequent] => (test, consequent, None),
        [test, consequent, alternate] => (test, consequent, Some(alternate)),
        _ => {
            return Err(malformed(
                format!("if: expected 2 or 3 operands, got {}", operands.len()),
                form,
            ));
        }
    };

    if eval_with_depth(test, env, depth + 1)?.is_truthy() {
        Ok(consequent.clone())
    } else {
        Ok(alternate.cloned().unwrap_or(Value::Unspecified))
    }
}

fn eval_define(
    operands: &[Value],
    env: &Environment,
    depth: usize,
    form: &Value,
) -> Result<Value, Error> {
    match operands {
        [Value::Symbol(name), expr] => {
            let value = eval_with_depth(expr, env, depth + 1)?;
            env.define(name.as_str(), value);
            Ok(Value::Unspecified)
        }
        // (define (name . params) body...)
        [Value::List(signature), body @ ..] if !body.is_empty() => {
            let Some((Value::Symbol(name), params)) = signature.split_first() else {
                return Err(malformed("define: procedure name must be a symbol", form));
            };
            let params = parse_params(params, form)?;
            let procedure = make_procedure(params, body, env);
            env.define(name.as_str(), procedure);
            Ok(Value::Unspecified)
        }
        _ => Err(malformed(
            "define: expected (define name expr) or (define (name params...) body...)",
            form,
        )),
    }
}

fn eval_set(
    operands: &[Value],
    env: &Environment,
    depth: usize,
    form: &Value,
) -> Result<Value, Error> {
    let [Value::Symbol(name), expr] = operands else {
        return Err(malformed("set!: expected (set! name expr)", form));
    };
    let value = eval_with_depth(expr, env, depth + 1)?;
    env.set(name, value)?;
    Ok(Value::Unspecified)
}

fn eval_lambda(operands: &[Value], env: &Environment, form: &Value) -> Result<Value, Error> {
    let Some((spec, body)) = operands.split_first() else {
        return Err(malformed("lambda: expected parameters and body", form));
    };
    if body.is_empty() {
        return Err(malformed("lambda: expected parameters and body", form));
    }
    let params = match spec {
        // (lambda args body) collects every argument
        Value::Symbol(rest) => Params {
            required: Vec::new(),
            rest: Some(rest.clone()),
        },
        Value::List(names) => parse_params(names, form)?,
        _ => return Err(malformed("lambda: parameters must be a list or a symbol", form)),
    };
    Ok(make_procedure(params, body, env))
}

/// Parse `(a b c)` or `(a b . rest)`, rejecting non-symbols and duplicates
fn parse_params(names: &[Value], form: &Value) -> Result<Params, Error> {
    let mut params = Params::default();
    let mut seen = HashSet::new();
    let mut iter = names.iter();

    while let Some(name) = iter.next() {
        let Value::Symbol(name) = name else {
            return Err(malformed("parameters must be symbols", form));
        };
        let name = if name == "." {
            match (iter.next(), iter.next()) {
                (Some(Value::Symbol(rest)), None) if rest != "." => {
                    params.rest = Some(rest.clone());
                    rest
                }
                _ => return Err(malformed("expected exactly one parameter after '.'", form)),
            }
        } else {
            params.required.push(name.clone());
            name
        };
        if !seen.insert(name.as_str()) {
            return Err(malformed(format!("duplicate parameter name: {name}"), form));
        }
    }
    Ok(params)
}

fn make_procedure(params: Params, body: &[Value], env: &Environment) -> Value {
    let body = match body {
        [single] => single.clone(),
        forms => {
            let mut sequence = Vec::with_capacity(forms.len() + 1);
            sequence.push(sym("begin"));
            sequence.extend_from_slice(forms);
            Value::list(sequence)
        }
    };
    Value::Procedure(Rc::new(Procedure {
        params,
        body,
        env: env.clone(),
    }))
}

/// Evaluate all but the last form; the last is returned for tail evaluation
fn eval_begin(operands: &[Value], env: &Environment, depth: usize) -> Result<Value, Error> {
    let Some((last, init)) = operands.split_last() else {
        return Ok(Value::Unspecified);
    };
    for expr in init {
        eval_with_depth(expr, env, depth + 1)?;
    }
    Ok(last.clone())
}

/// Outcome of a form that may finish early or continue in tail position
enum Step {
    Return(Value),
    Tail(Value),
}

/// `and` stops at the first false operand, `or` at the first true one.
/// The last operand is in tail position.
fn eval_logical(
    is_and: bool,
    operands: &[Value],
    env: &Environment,
    depth: usize,
) -> Result<Step, Error> {
    let Some((last, init)) = operands.split_last() else {
        return Ok(Step::Return(val(is_and)));
    };
    for expr in init {
        let value = eval_with_depth(expr, env, depth + 1)?;
        if value.is_truthy() != is_and {
            return Ok(Step::Return(value));
        }
    }
    Ok(Step::Tail(last.clone()))
}

fn eval_quasiquote(
    operands: &[Value],
    env: &Environment,
    depth: usize,
    form: &Value,
) -> Result<Value, Error> {
    let [template] = operands else {
        return Err(malformed(
            format!("quasiquote: expected exactly 1 operand, got {}", operands.len()),
            form,
        ));
    };
    expand_quasiquote(template, env, depth + 1)
}

fn unquoted<'a>(value: &'a Value, keyword: &str) -> Option<&'a Value> {
    match value.as_list()? {
        [Value::Symbol(s), expr] if s == keyword => Some(expr),
        _ => None,
    }
}

fn expand_quasiquote(template: &Value, env: &Environment, depth: usize) -> Result<Value, Error> {
    if let Some(expr) = unquoted(template, "unquote") {
        return eval_with_depth(expr, env, depth);
    }
    let Value::List(items) = template else {
        return Ok(template.clone());
    };

    let mut result = Vec::with_capacity(items.len());
    for item in items.iter() {
        if let Some(expr) = unquoted(item, "unquote-splicing") {
            match eval_with_depth(expr, env, depth)? {
                Value::List(spliced) => result.extend_from_slice(&spliced),
                other => {
                    return Err(Error::TypeError(format!(
                        "unquote-splicing requires a list, got {}",
                        other.type_name()
                    )));
                }
            }
        } else {
            result.push(expand_quasiquote(item, env, depth)?);
        }
    }
    Ok(Value::list(result))
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::nil;
    use crate::reader::read;
    use crate::{MAX_EVAL_DEPTH, SyntaxErrorKind};

    /// Test result variants for comprehensive testing
    #[derive(Debug)]
    enum TestResult {
        EvalResult(Value),           // Evaluation should succeed with this value
        SpecificError(&'static str), // Evaluation should fail with error containing this string
        AnyError,                    // Evaluation should fail (any error)
    }
    use TestResult::*;

    /// Test environment containing test cases that share state
    struct TestEnvironment(Vec<(&'static str, TestResult)>);

    /// Micro-helper for success cases in comprehensive tests
    fn success<T: Into<Value>>(value: T) -> TestResult {
        EvalResult(val(value))
    }

    /// Macro for setup expressions that return Unspecified (like define)
    macro_rules! test_setup {
        ($expr:expr) => {
            ($expr, EvalResult(Value::Unspecified))
        };
    }

    /// Run tests in isolated environments with shared state
    fn run_tests_in_environment(test_environments: Vec<TestEnvironment>) {
        for (env_idx, TestEnvironment(test_cases)) in test_environments.iter().enumerate() {
            let env = standard_environment();
            for (test_idx, (input, expected)) in test_cases.iter().enumerate() {
                let test_id = format!("Environment #{} test #{}", env_idx + 1, test_idx + 1);
                execute_test_case(input, expected, &env, &test_id);
            }
        }
    }

    /// Execute a single test case with detailed error reporting
    fn execute_test_case(input: &str, expected: &TestResult, env: &Environment, test_id: &str) {
        let expr = match read(input) {
            Ok(expr) => expr,
            Err(read_err) => {
                panic!("{test_id}: unexpected read error for '{input}': {read_err}");
            }
        };

        match (eval(&expr, env), expected) {
            (Ok(actual), EvalResult(expected_val)) => match (&actual, expected_val) {
                (Value::Unspecified, Value::Unspecified) => {}
                _ => assert_eq!(
                    actual, *expected_val,
                    "{test_id}: unexpected result for '{input}'"
                ),
            },
            (Err(_), AnyError) => {}
            (Err(e), SpecificError(expected_text)) => {
                let error_msg = format!("{e}");
                assert!(
                    error_msg.contains(expected_text),
                    "{test_id}: error should contain '{expected_text}', got: {error_msg}"
                );
            }
            (Ok(actual), AnyError) => {
                panic!("{test_id}: expected error for '{input}', got {actual:?}");
            }
            (Ok(actual), SpecificError(expected_text)) => {
                panic!("{test_id}: expected error containing '{expected_text}', got {actual:?}");
            }
            (Err(err), EvalResult(expected_val)) => {
                panic!("{test_id}: '{input}' expected {expected_val:?}, got error {err}");
            }
        }
    }

    /// Each case runs in a fresh standard environment
    fn run_comprehensive_tests(test_cases: Vec<(&'static str, TestResult)>) {
        for (i, (input, expected)) in test_cases.iter().enumerate() {
            let env = standard_environment();
            let test_id = format!("#{}", i + 1);
            execute_test_case(input, expected, &env, &test_id);
        }
    }

    #[test]
    fn test_comprehensive_operations_data_driven() {
        run_comprehensive_tests(vec![
            // Self-evaluating forms
            ("42", success(42)),
            ("2.5", success(2.5)),
            ("#t", success(true)),
            ("\"hello\"", success("hello")),
            ("1+2i", success(crate::ast::Complex::new(1.0, 2.0))),
            // Arithmetic
            ("(+ 1 1)", success(2)),
            ("(* 10 (+ 8 8))", success(160)),
            ("(- 10 3 2)", success(5)),
            ("(/ 6 2)", success(3.0)),
            ("(+ (* 2 3) (- 8 2))", success(12)),
            ("(* pi 0)", success(0.0)),
            ("(+ 9223372036854775807 1)", SpecificError("overflow")),
            ("(/ 1 0)", SpecificError("division by zero")),
            // Variables
            ("pi", success(std::f64::consts::PI)),
            ("undefined-var", SpecificError("Unbound variable: undefined-var")),
            // quote
            ("(quote x)", EvalResult(sym("x"))),
            ("'(1 2 3)", success([1, 2, 3])),
            ("'()", EvalResult(nil())),
            ("(quote)", SpecificError("quote: expected exactly 1 operand")),
            ("(quote a b)", AnyError),
            // if
            ("(if #t 1 2)", success(1)),
            ("(if #f 1 2)", success(2)),
            ("(if 0 'zero 'other)", EvalResult(sym("zero"))), // Only #f is false
            ("(if '() 'nil 'other)", EvalResult(sym("nil"))),
            ("(if (> 3 2) 'yes 'no)", EvalResult(sym("yes"))),
            ("(if #f 1)", EvalResult(Value::Unspecified)),
            ("(if)", SpecificError("if: expected 2 or 3 operands, got 0")),
            ("(if 1 2 3 4)", AnyError),
            // and / or
            ("(and)", success(true)),
            ("(or)", success(false)),
            ("(and 1 2 3)", success(3)),
            ("(and 1 #f undefined)", success(false)), // Short circuit
            ("(or #f 2 undefined)", success(2)),
            ("(or #f #f)", success(false)),
            ("(and 1 'sym)", EvalResult(sym("sym"))),
            ("(or '(a) 2)", EvalResult(val(vec![sym("a")]))),
            // begin
            ("(begin 1 2 3)", success(3)),
            ("(begin)", EvalResult(Value::Unspecified)),
            // lambda and application
            ("((lambda (x) (* x x)) 7)", success(49)),
            ("((lambda (x y) (+ x y)) 3 4)", success(7)),
            ("((lambda () 5))", success(5)),
            ("((lambda args args) 1 2 3)", success([1, 2, 3])),
            ("((lambda (a . rest) rest) 1 2 3)", success([2, 3])),
            ("((lambda (a . rest) rest) 1)", EvalResult(nil())),
            ("((lambda (x) 1 2 x) 3)", success(3)), // Multiple body forms
            ("((lambda (x) x))", SpecificError("expected exactly 1 arguments, got 0")),
            ("((lambda (x x) x) 1 2)", SpecificError("duplicate parameter name: x")),
            ("(lambda (1) x)", SpecificError("parameters must be symbols")),
            ("(lambda (x))", AnyError),
            ("(lambda (a . b c) a)", AnyError),
            ("(5 1 2)", SpecificError("NotCallable: 5 is not a procedure")),
            ("(\"f\")", AnyError),
            ("()", SpecificError("Cannot evaluate empty list")),
            // Builtin arity errors name the builtin
            ("(car)", SpecificError("car: expected exactly 1 arguments, got 0")),
            // quasiquote
            ("`(1 ,(+ 1 1) ,@(list 3 4))", success([1, 2, 3, 4])),
            ("`x", EvalResult(sym("x"))),
            ("`,(+ 2 3)", success(5)),
            ("`(a (b ,(* 2 3)) ,@'())", EvalResult(val(vec![sym("a"), val(vec![sym("b"), val(6)])]))),
            ("`(1 ,@2)", SpecificError("unquote-splicing requires a list")),
            // Printing of procedures
            ("(procedure? (lambda (x) x))", success(true)),
            ("(procedure? car)", success(true)),
            // Higher-order builtins with closures
            ("(map (lambda (x) (* x x)) '(1 2 3))", success([1, 4, 9])),
            ("(map + '(1 2) '(10 20 30))", success([11, 22])),
            ("(apply + '(1 2 3))", success(6)),
            ("(apply (lambda (a b) (- a b)) '(10 3))", success(7)),
            ("(apply car '(1 2))", AnyError),
        ]);
    }

    #[test]
    fn test_define_and_set() {
        run_tests_in_environment(vec![
            TestEnvironment(vec![
                test_setup!("(define r 10)"),
                ("(* pi (* r r))", success(std::f64::consts::PI * 100.0)),
                test_setup!("(set! r 20)"),
                ("r", success(20)),
                ("(set! undefined-x 5)", SpecificError("Unbound variable: undefined-x")),
                ("undefined-x", SpecificError("Unbound variable")), // Nothing was bound
                ("(set! r)", AnyError),
                ("(define)", AnyError),
                ("(define 5 1)", AnyError),
                // A failing definition binds nothing
                ("(define broken (car '()))", SpecificError("car of empty list")),
                ("broken", SpecificError("Unbound variable")),
            ]),
            TestEnvironment(vec![
                test_setup!("(define (square x) (* x x))"),
                ("(square 12)", success(144)),
                test_setup!("(define (sum . xs) (apply + xs))"),
                ("(sum 1 2 3 4)", success(10)),
                test_setup!("(define (first a . ignored) a)"),
                ("(first 'x 'y 'z)", EvalResult(sym("x"))),
                ("(define (5 x) x)", AnyError),
                ("(define (f x))", AnyError),
            ]),
            // define shadows in the current frame instead of mutating outer bindings
            TestEnvironment(vec![
                test_setup!("(define x 1)"),
                test_setup!("(define (shadow) (define x 2) x)"),
                ("(shadow)", success(2)),
                ("x", success(1)),
                test_setup!("(define (mutate) (set! x 3) x)"),
                ("(mutate)", success(3)),
                ("x", success(3)),
            ]),
            // Closures capture their defining environment
            TestEnvironment(vec![
                test_setup!(
                    "(define (make-counter) (define n 0) (lambda () (set! n (+ n 1)) n))"
                ),
                test_setup!("(define c1 (make-counter))"),
                test_setup!("(define c2 (make-counter))"),
                ("(c1)", success(1)),
                ("(c1)", success(2)),
                ("(c2)", success(1)),
                ("(c1)", success(3)),
                test_setup!("(define (adder n) (lambda (x) (+ x n)))"),
                test_setup!("(define add5 (adder 5))"),
                ("(add5 10)", success(15)),
                ("(map (adder 1) '(1 2 3))", success([2, 3, 4])),
            ]),
        ]);
    }

    #[test]
    fn test_tail_calls_run_in_constant_depth() {
        run_tests_in_environment(vec![TestEnvironment(vec![
            test_setup!("(define (count n) (if (= n 0) 'done (count (- n 1))))"),
            ("(count 100000)", EvalResult(sym("done"))),
            test_setup!("(define (loop n acc) (if (= n 0) acc (loop (- n 1) (+ acc 1))))"),
            ("(loop 100000 0)", success(100000)),
            test_setup!("(define (even? n) (if (= n 0) #t (odd? (- n 1))))"),
            test_setup!("(define (odd? n) (if (= n 0) #f (even? (- n 1))))"),
            ("(even? 100001)", success(false)),
            // Tail positions inside begin, and, or
            test_setup!("(define (b n) (begin 0 (if (= n 0) 'ok (b (- n 1)))))"),
            ("(b 100000)", EvalResult(sym("ok"))),
            test_setup!("(define (a n) (and #t (if (= n 0) 'ok (a (- n 1)))))"),
            ("(a 100000)", EvalResult(sym("ok"))),
            test_setup!("(define (o n) (or #f (if (= n 0) 'ok (o (- n 1)))))"),
            ("(o 100000)", EvalResult(sym("ok"))),
        ])]);
    }

    #[test]
    fn test_evaluation_depth_limit() {
        with_eval_stack(|| {
            run_tests_in_environment(vec![TestEnvironment(vec![
                test_setup!("(define (fact n) (if (= n 0) 1 (* n (fact (- n 1)))))"),
                ("(fact 5)", success(120)),
                ("(fact 20)", success(2432902008176640000i64)),
                ("(fact 100000)", SpecificError("Evaluation depth limit exceeded")),
                // Recursion through a higher-order builtin is bounded too
                test_setup!("(define (deep n) (if (= n 0) 0 (+ 1 (apply deep (list (- n 1))))))"),
                ("(deep 10)", success(10)),
                ("(deep 100000)", SpecificError("Evaluation depth limit exceeded")),
                // Ordinary non-tail recursion over a few hundred elements fits
                test_setup!("(define (range n acc) (if (= n 0) acc (range (- n 1) (cons n acc))))"),
                test_setup!("(define (sum l) (if (null? l) 0 (+ (car l) (sum (cdr l)))))"),
                ("(sum (range 500 '()))", success(125250)),
                ("(deep 400)", success(400)),
            ])]);
        })
        .unwrap();

        // Shallow nesting needs no extra stack
        let env = standard_environment();
        let nested = format!("{}0{}", "(+ 1 ".repeat(50), ")".repeat(50));
        assert_eq!(eval(&read(&nested).unwrap(), &env).unwrap(), val(50));
        assert!(MAX_EVAL_DEPTH > 50);
    }

    #[test]
    fn test_deeply_nested_runtime_values() {
        run_tests_in_environment(vec![TestEnvironment(vec![
            test_setup!("(define (nest n acc) (if (= n 0) acc (nest (- n 1) (list acc))))"),
            test_setup!("(define big (nest 200000 '()))"),
            ("(equal? big (nest 200000 '()))", success(true)),
            ("(equal? big (nest 199999 '()))", success(false)),
            ("(length (car big))", success(1)),
            // Rebinding releases the only reference
            test_setup!("(define big 0)"),
            ("big", success(0)),
            // A chain of closures, each capturing the previous one
            test_setup!("(define (wrap f n) (if (= n 0) f (wrap (lambda () (f)) (- n 1))))"),
            test_setup!("(define chain (wrap (lambda () 'end) 200000))"),
            ("(chain)", EvalResult(sym("end"))),
            test_setup!("(set! chain 0)"),
            ("chain", success(0)),
        ])]);
    }

    #[test]
    fn test_malformed_forms_are_syntax_errors() {
        let env = standard_environment();
        for input in ["(if)", "(quote)", "(set! 5 1)", "(lambda)", "(define)", "(quasiquote)"] {
            let err = eval(&read(input).unwrap(), &env).unwrap_err();
            assert_eq!(
                err.syntax_kind(),
                Some(SyntaxErrorKind::MalformedForm),
                "'{input}' gave {err}"
            );
        }
    }

    #[test]
    fn test_apply_from_host() {
        let env = standard_environment();
        let square = eval(&read("(lambda (x) (* x x))").unwrap(), &env).unwrap();
        assert_eq!(apply(&square, vec![val(9)]).unwrap(), val(81));
        assert!(matches!(
            apply(&square, vec![]),
            Err(Error::ArityError { got: 0, .. })
        ));
        assert!(matches!(
            apply(&val(1), vec![]),
            Err(Error::NotCallable(_))
        ));

        let plus = env.lookup("+").unwrap();
        assert_eq!(apply(&plus, vec![val(1), val(2)]).unwrap(), val(3));
    }

    #[test]
    fn test_standard_environment_contents() {
        let env = standard_environment();
        for name in ["+", "car", "map", "apply", "sqrt", "gcd", "pi", "e", "tau", "nan", "inf"] {
            assert!(env.get(name).is_some(), "{name} should be bound");
        }
        assert!(env.outer().is_none());
        assert_eq!(print(&env.lookup("car").unwrap()), "#<builtin:car>");
    }
}
