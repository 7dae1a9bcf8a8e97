//! Typed programs built the way a front end would hand them over.

use prevc_core::ast::*;

fn program(decls: Vec<Decl>) -> Program {
    Program { decls }
}

fn putc_decl(b: &mut AstBuilder) -> FunDecl {
    let c = b.param("c", Type::Char);
    b.fun("putc", vec![c], Type::Void)
}

/// `fun main(): int = 1 + 2 * 3`
pub fn arithmetic() -> Program {
    let mut b = AstBuilder::new();
    let main = b.fun("main", vec![], Type::Int);
    let one = b.int(1);
    let two = b.int(2);
    let three = b.int(3);
    let mul = b.binary(BinOp::Mul, two, three);
    let body = b.binary(BinOp::Add, one, mul);
    program(vec![Decl::Fun(main.define(body))])
}

/// Recursive factorial with a local result variable.
///
/// ```text
/// fun fact(n: int): int = { if n <= 1 then r = 1 else r = n * fact(n - 1); r } where { var r: int }
/// fun main(): int = fact(n)
/// ```
pub fn factorial(n: i64) -> Program {
    let mut b = AstBuilder::new();
    let p = b.param("n", Type::Int);
    let fact = b.fun("fact", vec![p.clone()], Type::Int);
    let r = b.var("r", Type::Int);

    let n1 = b.param_ref(&p);
    let one = b.int(1);
    let cond = b.binary(BinOp::Le, n1, one);

    let dst = b.var_ref(&r);
    let one = b.int(1);
    let base = b.assign(dst, one);

    let n2 = b.param_ref(&p);
    let n3 = b.param_ref(&p);
    let one = b.int(1);
    let dec = b.binary(BinOp::Sub, n3, one);
    let rec = b.call(&fact, vec![dec]);
    let prod = b.binary(BinOp::Mul, n2, rec);
    let dst = b.var_ref(&r);
    let step = b.assign(dst, prod);

    let branch = b.if_(cond, vec![base], vec![step]);
    let result = b.var_ref(&r);
    let result = b.expr_stmt(result);
    let block = b.block(vec![branch, result]);
    let body = b.where_(block, vec![Decl::Var(r)]);
    let fact = fact.define(body);

    let main = b.fun("main", vec![], Type::Int);
    let arg = b.int(n);
    let call = b.call(&fact, vec![arg]);
    program(vec![Decl::Fun(fact), Decl::Fun(main.define(call))])
}

/// `fun main(): int = { if x < 10 then r = 1 else r = 2; r } where { var r: int }`
pub fn branch(x: i64) -> Program {
    let mut b = AstBuilder::new();
    let main = b.fun("main", vec![], Type::Int);
    let r = b.var("r", Type::Int);

    let lhs = b.int(x);
    let ten = b.int(10);
    let cond = b.binary(BinOp::Lt, lhs, ten);
    let dst = b.var_ref(&r);
    let one = b.int(1);
    let then_branch = b.assign(dst, one);
    let dst = b.var_ref(&r);
    let two = b.int(2);
    let else_branch = b.assign(dst, two);
    let branch = b.if_(cond, vec![then_branch], vec![else_branch]);

    let result = b.var_ref(&r);
    let result = b.expr_stmt(result);
    let block = b.block(vec![branch, result]);
    let body = b.where_(block, vec![Decl::Var(r)]);
    program(vec![Decl::Fun(main.define(body))])
}

/// Sum of `1..=n` with a while loop.
pub fn sum_loop(n: i64) -> Program {
    let mut b = AstBuilder::new();
    let main = b.fun("main", vec![], Type::Int);
    let i = b.var("i", Type::Int);
    let s = b.var("s", Type::Int);

    let dst = b.var_ref(&i);
    let one = b.int(1);
    let init_i = b.assign(dst, one);
    let dst = b.var_ref(&s);
    let zero = b.int(0);
    let init_s = b.assign(dst, zero);

    let iv = b.var_ref(&i);
    let limit = b.int(n);
    let cond = b.binary(BinOp::Le, iv, limit);

    let sv = b.var_ref(&s);
    let iv = b.var_ref(&i);
    let add = b.binary(BinOp::Add, sv, iv);
    let dst = b.var_ref(&s);
    let acc = b.assign(dst, add);
    let iv = b.var_ref(&i);
    let one = b.int(1);
    let inc = b.binary(BinOp::Add, iv, one);
    let dst = b.var_ref(&i);
    let step = b.assign(dst, inc);
    let lp = b.while_(cond, vec![acc, step]);

    let result = b.var_ref(&s);
    let result = b.expr_stmt(result);
    let block = b.block(vec![init_i, init_s, lp, result]);
    let body = b.where_(block, vec![Decl::Var(i), Decl::Var(s)]);
    program(vec![Decl::Fun(main.define(body))])
}

/// Operands are evaluated left to right, calls included.
///
/// ```text
/// fun p(c: char): int = { putc(c); 1 }
/// fun main(): int = p('a') + p('b') * p('c')
/// ```
pub fn evaluation_order() -> Program {
    let mut b = AstBuilder::new();
    let putc = putc_decl(&mut b);
    let c = b.param("c", Type::Char);
    let p = b.fun("p", vec![c.clone()], Type::Int);
    let cv = b.param_ref(&c);
    let out = b.call(&putc, vec![cv]);
    let out = b.expr_stmt(out);
    let one = b.int(1);
    let one = b.expr_stmt(one);
    let body = b.block(vec![out, one]);
    let p = p.define(body);

    let main = b.fun("main", vec![], Type::Int);
    let a = b.chr(b'a');
    let pa = b.call(&p, vec![a]);
    let bb = b.chr(b'b');
    let pb = b.call(&p, vec![bb]);
    let cc = b.chr(b'c');
    let pc = b.call(&p, vec![cc]);
    let mul = b.binary(BinOp::Mul, pb, pc);
    let body = b.binary(BinOp::Add, pa, mul);
    program(vec![
        Decl::Fun(putc),
        Decl::Fun(p),
        Decl::Fun(main.define(body)),
    ])
}

/// A variable of `main` read two function levels down.
///
/// ```text
/// fun main(): int = { x = 5; f() } where {
///     var x: int
///     fun f(): int = g() where { fun g(): int = x + 1 }
/// }
/// ```
pub fn static_link() -> Program {
    let mut b = AstBuilder::new();
    let main = b.fun("main", vec![], Type::Int);
    let x = b.var("x", Type::Int);
    let f = b.fun("f", vec![], Type::Int);
    let g = b.fun("g", vec![], Type::Int);

    let xv = b.var_ref(&x);
    let one = b.int(1);
    let g_body = b.binary(BinOp::Add, xv, one);
    let g = g.define(g_body);

    let call_g = b.call(&g, vec![]);
    let f_body = b.where_(call_g, vec![Decl::Fun(g)]);
    let f = f.define(f_body);

    let dst = b.var_ref(&x);
    let five = b.int(5);
    let init = b.assign(dst, five);
    let call_f = b.call(&f, vec![]);
    let call_f = b.expr_stmt(call_f);
    let block = b.block(vec![init, call_f]);
    let body = b.where_(block, vec![Decl::Var(x), Decl::Fun(f)]);
    program(vec![Decl::Fun(main.define(body))])
}

/// Prints a string literal character by character.
///
/// ```text
/// fun puts(s: ^char): void = { while s^ != '\0' do { putc(s^); s = (^char)((int)s + 8) } }
/// fun main(): int = { puts("hi\n"); 0 }
/// ```
pub fn hello() -> Program {
    let mut b = AstBuilder::new();
    let putc = putc_decl(&mut b);
    let s = b.param("s", Type::ptr(Type::Char));
    let puts = b.fun("puts", vec![s.clone()], Type::Void);

    let sv = b.param_ref(&s);
    let ch = b.deref(sv);
    let nul = b.chr(0);
    let cond = b.binary(BinOp::Ne, ch, nul);

    let sv = b.param_ref(&s);
    let ch = b.deref(sv);
    let out = b.call(&putc, vec![ch]);
    let out = b.expr_stmt(out);
    let sv = b.param_ref(&s);
    let addr = b.cast(Type::Int, sv);
    let eight = b.int(8);
    let next = b.binary(BinOp::Add, addr, eight);
    let next = b.cast(Type::ptr(Type::Char), next);
    let dst = b.param_ref(&s);
    let advance = b.assign(dst, next);
    let lp = b.while_(cond, vec![out, advance]);
    let body = b.block(vec![lp]);
    let puts = puts.define(body);

    let main = b.fun("main", vec![], Type::Int);
    let text = b.string("hi\n");
    let call = b.call(&puts, vec![text]);
    let call = b.expr_stmt(call);
    let zero = b.int(0);
    let zero = b.expr_stmt(zero);
    let body = b.block(vec![call, zero]);
    program(vec![
        Decl::Fun(putc),
        Decl::Fun(puts),
        Decl::Fun(main.define(body)),
    ])
}

/// Fills a global array with squares and sums it.
pub fn arrays() -> Program {
    let mut b = AstBuilder::new();
    let a = b.var("a", Type::array(Type::Int, 10));
    let main = b.fun("main", vec![], Type::Int);
    let i = b.var("i", Type::Int);
    let s = b.var("s", Type::Int);

    let mut stmts = Vec::new();
    let dst = b.var_ref(&i);
    let zero = b.int(0);
    stmts.push(b.assign(dst, zero));

    let iv = b.var_ref(&i);
    let ten = b.int(10);
    let cond = b.binary(BinOp::Lt, iv, ten);
    let av = b.var_ref(&a);
    let iv = b.var_ref(&i);
    let dst = b.index(av, iv);
    let i1 = b.var_ref(&i);
    let i2 = b.var_ref(&i);
    let sq = b.binary(BinOp::Mul, i1, i2);
    let fill = b.assign(dst, sq);
    let iv = b.var_ref(&i);
    let one = b.int(1);
    let inc = b.binary(BinOp::Add, iv, one);
    let dst = b.var_ref(&i);
    let step = b.assign(dst, inc);
    stmts.push(b.while_(cond, vec![fill, step]));

    let dst = b.var_ref(&i);
    let zero = b.int(0);
    stmts.push(b.assign(dst, zero));
    let dst = b.var_ref(&s);
    let zero = b.int(0);
    stmts.push(b.assign(dst, zero));

    let iv = b.var_ref(&i);
    let ten = b.int(10);
    let cond = b.binary(BinOp::Lt, iv, ten);
    let sv = b.var_ref(&s);
    let av = b.var_ref(&a);
    let iv = b.var_ref(&i);
    let elem = b.index(av, iv);
    let add = b.binary(BinOp::Add, sv, elem);
    let dst = b.var_ref(&s);
    let acc = b.assign(dst, add);
    let iv = b.var_ref(&i);
    let one = b.int(1);
    let inc = b.binary(BinOp::Add, iv, one);
    let dst = b.var_ref(&i);
    let step = b.assign(dst, inc);
    stmts.push(b.while_(cond, vec![acc, step]));

    let result = b.var_ref(&s);
    stmts.push(b.expr_stmt(result));
    let block = b.block(stmts);
    let body = b.where_(block, vec![Decl::Var(i), Decl::Var(s)]);
    program(vec![Decl::Var(a), Decl::Fun(main.define(body))])
}

/// `var p: { x: int, y: int }`, `main = { p.x = 3; p.y = 7; p.x * p.y }`
pub fn records() -> Program {
    let mut b = AstBuilder::new();
    let cx = b.component("x", Type::Int);
    let cy = b.component("y", Type::Int);
    let p = b.var("p", Type::Record(vec![cx.clone(), cy.clone()]));
    let main = b.fun("main", vec![], Type::Int);

    let pv = b.var_ref(&p);
    let dst = b.field(pv, &cx);
    let three = b.int(3);
    let set_x = b.assign(dst, three);
    let pv = b.var_ref(&p);
    let dst = b.field(pv, &cy);
    let seven = b.int(7);
    let set_y = b.assign(dst, seven);

    let pv = b.var_ref(&p);
    let x = b.field(pv, &cx);
    let pv = b.var_ref(&p);
    let y = b.field(pv, &cy);
    let prod = b.binary(BinOp::Mul, x, y);
    let prod = b.expr_stmt(prod);
    let body = b.block(vec![set_x, set_y, prod]);
    program(vec![Decl::Var(p), Decl::Fun(main.define(body))])
}

/// Heap allocation through the runtime.
///
/// ```text
/// fun main(): int = { q = (^int) new 16; q^ = 41; r = q^ + 1; del q; r }
///     where { var q: ^int; var r: int }
/// ```
pub fn heap() -> Program {
    let mut b = AstBuilder::new();
    let main = b.fun("main", vec![], Type::Int);
    let q = b.var("q", Type::ptr(Type::Int));
    let r = b.var("r", Type::Int);

    let size = b.int(16);
    let block = b.prefix(PrefixOp::New, size);
    let block = b.cast(Type::ptr(Type::Int), block);
    let dst = b.var_ref(&q);
    let alloc = b.assign(dst, block);

    let qv = b.var_ref(&q);
    let dst = b.deref(qv);
    let v = b.int(41);
    let store = b.assign(dst, v);

    let qv = b.var_ref(&q);
    let cell = b.deref(qv);
    let one = b.int(1);
    let sum = b.binary(BinOp::Add, cell, one);
    let dst = b.var_ref(&r);
    let read = b.assign(dst, sum);

    let qv = b.var_ref(&q);
    let free = b.prefix(PrefixOp::Del, qv);
    let free = b.expr_stmt(free);

    let rv = b.var_ref(&r);
    let result = b.expr_stmt(rv);
    let block = b.block(vec![alloc, store, read, free, result]);
    let body = b.where_(block, vec![Decl::Var(q), Decl::Var(r)]);
    program(vec![Decl::Fun(main.define(body))])
}

/// `((1+2)+(3+4))+((5+6)+(7+8))`: more values live at once than three
/// registers can hold.
pub fn register_pressure() -> Program {
    let mut b = AstBuilder::new();
    let main = b.fun("main", vec![], Type::Int);
    let mut leaves: Vec<Expr> = (1..=8).map(|v| b.int(v)).collect();
    while leaves.len() > 1 {
        let mut next = Vec::new();
        let mut it = leaves.into_iter();
        while let (Some(l), Some(r)) = (it.next(), it.next()) {
            next.push(b.binary(BinOp::Add, l, r));
        }
        leaves = next;
    }
    let body = leaves.remove(0);
    program(vec![Decl::Fun(main.define(body))])
}

/// `(100 / 7) * 10 + 100 % 7 - -(8)`
pub fn arithmetic_mix() -> Program {
    let mut b = AstBuilder::new();
    let main = b.fun("main", vec![], Type::Int);
    let hundred = b.int(100);
    let seven = b.int(7);
    let quot = b.binary(BinOp::Div, hundred, seven);
    let ten = b.int(10);
    let scaled = b.binary(BinOp::Mul, quot, ten);
    let hundred = b.int(100);
    let seven = b.int(7);
    let rem = b.binary(BinOp::Mod, hundred, seven);
    let sum = b.binary(BinOp::Add, scaled, rem);
    let eight = b.int(8);
    let neg = b.prefix(PrefixOp::Minus, eight);
    let body = b.binary(BinOp::Sub, sum, neg);
    program(vec![Decl::Fun(main.define(body))])
}

/// `(int)(!(3 > 4) & (2 <= 2) | (1 == 2)) + (int)(char)321`
pub fn logic_and_casts() -> Program {
    let mut b = AstBuilder::new();
    let main = b.fun("main", vec![], Type::Int);
    let three = b.int(3);
    let four = b.int(4);
    let gt = b.binary(BinOp::Gt, three, four);
    let not = b.prefix(PrefixOp::Not, gt);
    let two = b.int(2);
    let two2 = b.int(2);
    let le = b.binary(BinOp::Le, two, two2);
    let and = b.binary(BinOp::And, not, le);
    let one = b.int(1);
    let two = b.int(2);
    let eq = b.binary(BinOp::Eq, one, two);
    let or = b.binary(BinOp::Or, and, eq);
    let truth = b.cast(Type::Int, or);
    let big = b.int(321);
    let ch = b.cast(Type::Char, big);
    let code = b.cast(Type::Int, ch);
    let body = b.binary(BinOp::Add, truth, code);
    program(vec![Decl::Fun(main.define(body))])
}

/// `(123456789012 - 123456789000) + (-70000 + 70005)`
pub fn constants() -> Program {
    let mut b = AstBuilder::new();
    let main = b.fun("main", vec![], Type::Int);
    let big = b.int(123_456_789_012);
    let less = b.int(123_456_789_000);
    let diff = b.binary(BinOp::Sub, big, less);
    let neg = b.int(-70_000);
    let pos = b.int(70_005);
    let sum = b.binary(BinOp::Add, neg, pos);
    let body = b.binary(BinOp::Add, diff, sum);
    program(vec![Decl::Fun(main.define(body))])
}

/// A local array large enough to push frame offsets past one byte.
///
/// `fun main(): int = { arr[39] = 9; arr[0] = 1; arr[39] + arr[0] } where { var arr: [40]int }`
pub fn big_frame() -> Program {
    let mut b = AstBuilder::new();
    let main = b.fun("main", vec![], Type::Int);
    let arr = b.var("arr", Type::array(Type::Int, 40));

    let mut stmts = Vec::new();
    for (idx, v) in [(39, 9), (0, 1)] {
        let av = b.var_ref(&arr);
        let i = b.int(idx);
        let dst = b.index(av, i);
        let v = b.int(v);
        stmts.push(b.assign(dst, v));
    }
    let av = b.var_ref(&arr);
    let i = b.int(39);
    let last = b.index(av, i);
    let av = b.var_ref(&arr);
    let i = b.int(0);
    let first = b.index(av, i);
    let sum = b.binary(BinOp::Add, last, first);
    stmts.push(b.expr_stmt(sum));
    let block = b.block(stmts);
    let body = b.where_(block, vec![Decl::Var(arr)]);
    program(vec![Decl::Fun(main.define(body))])
}

/// Reads one character and writes it back.
///
/// `fun main(): int = { c = getc(); putc(c); (int)c } where { var c: char }`
pub fn echo() -> Program {
    let mut b = AstBuilder::new();
    let putc = putc_decl(&mut b);
    let getc = b.fun("getc", vec![], Type::Char);
    let main = b.fun("main", vec![], Type::Int);
    let c = b.var("c", Type::Char);

    let read = b.call(&getc, vec![]);
    let dst = b.var_ref(&c);
    let read = b.assign(dst, read);
    let cv = b.var_ref(&c);
    let write = b.call(&putc, vec![cv]);
    let write = b.expr_stmt(write);
    let cv = b.var_ref(&c);
    let code = b.cast(Type::Int, cv);
    let code = b.expr_stmt(code);
    let block = b.block(vec![read, write, code]);
    let body = b.where_(block, vec![Decl::Var(c)]);
    program(vec![
        Decl::Fun(putc),
        Decl::Fun(getc),
        Decl::Fun(main.define(body)),
    ])
}

/// A program without `main`.
pub fn no_main() -> Program {
    let mut b = AstBuilder::new();
    let f = b.fun("f", vec![], Type::Int);
    let one = b.int(1);
    program(vec![Decl::Fun(f.define(one))])
}

/// A program that runs to completion, with its input and expected
/// exit value and output.
pub struct Case {
    pub name: &'static str,
    pub program: Program,
    pub input: &'static [u8],
    pub exit: i64,
    pub output: &'static str,
}

fn case(name: &'static str, program: Program, exit: i64) -> Case {
    Case {
        name,
        program,
        input: b"",
        exit,
        output: "",
    }
}

pub fn runnable() -> Vec<Case> {
    vec![
        case("arithmetic", arithmetic(), 7),
        case("factorial", factorial(5), 120),
        case("branch_then", branch(3), 1),
        case("branch_else", branch(12), 2),
        case("sum_loop", sum_loop(10), 55),
        Case {
            output: "abc",
            ..case("evaluation_order", evaluation_order(), 2)
        },
        case("static_link", static_link(), 6),
        Case {
            output: "hi\n",
            ..case("hello", hello(), 0)
        },
        case("arrays", arrays(), 285),
        case("records", records(), 21),
        case("heap", heap(), 42),
        case("register_pressure", register_pressure(), 36),
        case("arithmetic_mix", arithmetic_mix(), 150),
        case("logic_and_casts", logic_and_casts(), 66),
        case("constants", constants(), 17),
        case("big_frame", big_frame(), 10),
        Case {
            input: b"x\n",
            output: "x",
            ..case("echo", echo(), 120)
        },
    ]
}
