//! End-to-end compilation scenarios over in-memory sources.

use crescent::compile_sources;

fn compile_one(source: &str) -> String {
    let files = [("main.cres", source)];
    compile_sources("main.cres", &files).unwrap_or_else(|err| panic!("compile failed: {err}\nsource:\n{source}"))
}

fn compile_err(source: &str) -> String {
    let files = [("main.cres", source)];
    compile_sources("main.cres", &files)
        .expect_err("expected a compile error")
        .rendered_message()
}

#[test]
fn dead_stores_vanish_when_never_read() {
    let output = compile_one("@init { int a = 5; a = 7; a = 9; }");
    assert!(!output.contains("= 5"), "got: {output}");
    assert!(!output.contains("= 7"), "got: {output}");
    assert!(!output.contains("= 9"), "got: {output}");
}

#[test]
fn only_the_last_store_survives_a_later_read() {
    let output = compile_one(
        "@init { int a = 5; a = 7; a = jsfx.srate * 2; jsfx.spl0 = a + 1; }",
    );
    assert!(!output.contains("= 5"), "got: {output}");
    assert!(!output.contains("= 7"), "got: {output}");
    assert!(output.contains("srate * 2"), "got: {output}");
    assert!(output.contains("+ 1)"), "got: {output}");
}

#[test]
fn struct_round_trip_expands_to_suffixed_scalars() {
    let output = compile_one(
        "public struct V { float x; float y; }\nV v;\n@init { v.x = 1.0; v.y = 2.0; }\n@block { jsfx.spl0 = v.x + v.y; }",
    );
    assert!(output.contains("v_x_"), "got: {output}");
    assert!(output.contains("v_y_"), "got: {output}");
    assert!(output.contains("= 1.0;"), "got: {output}");
    assert!(output.contains("= 2.0;"), "got: {output}");
    // the type itself leaves no trace
    assert!(!output.contains("struct"), "got: {output}");
    // distinct unique suffixes on the two leaves
    let x_name = emitted_name(&output, "v_x_");
    let y_name = emitted_name(&output, "v_y_");
    assert_ne!(x_name, y_name);
}

fn emitted_name(output: &str, prefix: &str) -> String {
    let start = output.find(prefix).unwrap_or_else(|| panic!("{prefix} not in output"));
    output[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

#[test]
fn returns_flatten_into_flag_protocol() {
    let output = compile_one(
        "int f(int x) { if (x > 0) return x; return -x; }\n@init { jsfx.spl0 = f(2); }",
    );
    assert!(output.contains("function f_"), "got: {output}");
    assert!(output.contains("__return_"), "got: {output}");
    assert!(output.contains("__returnValue_"), "got: {output}");
    assert!(output.contains("!__return_"), "got: {output}");
}

#[test]
fn for_loops_become_while_with_continue_flags() {
    let output = compile_one(
        "@init { int total = 0; for (int i = 0; i < 10; i += 1) { if (i == 5) continue; total = total + 1; } jsfx.spl0 = total; }",
    );
    assert!(output.contains("while ("), "got: {output}");
    assert!(output.contains("__continue_"), "got: {output}");
    assert!(!output.contains("for"), "got: {output}");
}

#[test]
fn array_declarations_synthesize_ptr_and_length() {
    let output = compile_one("int[] a;\n@init { a.length = 3; }\n@block { jsfx.spl0 = a.length; }");
    assert!(output.contains("a_length_"), "got: {output}");
    assert!(output.contains("= 3;"), "got: {output}");
}

#[test]
fn array_subscripts_go_through_the_ptr_member() {
    let output = compile_one(
        "float[] buf;\n@init { buf.ptr = 1000; }\n@sample { buf[0] = 0.5; jsfx.spl0 = buf[0]; }",
    );
    assert!(output.contains("buf_ptr_"), "got: {output}");
    assert!(output.contains("[0]"), "got: {output}");
}

#[test]
fn circular_imports_are_rejected() {
    let files = [
        ("m1.cres", "import \"m2.cres\";\n@init { }"),
        ("m2.cres", "import \"m1.cres\";"),
    ];
    let err = compile_sources("m1.cres", &files).expect_err("expected circular dependency");
    assert_eq!(err.rendered_message(), "Circular dependency detected");
}

#[test]
fn postfix_increment_yields_the_old_value() {
    let output = compile_one("@init { int x = 1; int y = x++; jsfx.spl0 = y * 10 + x; }");
    // the temporary holding the pre-increment value survives into output
    assert!(output.contains("__temp_"), "got: {output}");
}

#[test]
fn integer_division_truncates_unless_folded() {
    let output = compile_one("int d = 3;\n@init { jsfx.spl0 = d / 2; }");
    assert!(output.contains("| 0)"), "got: {output}");
}

#[test]
fn modules_resolve_qualified_accesses() {
    let files = [
        (
            "main.cres",
            "import \"util.cres\";\n@sample { jsfx.spl0 = util.half(jsfx.spl0); }",
        ),
        ("util.cres", "public float half(float x) { return x / 2; }"),
    ];
    let output = compile_sources("main.cres", &files).unwrap();
    assert!(output.contains("function half_"), "got: {output}");
    assert!(output.contains("// Module: util.cres"), "got: {output}");
    // imports come out before importers
    let util_at = output.find("// Module: util.cres").unwrap();
    let main_at = output.find("// Module: main.cres").unwrap();
    assert!(util_at < main_at);
}

#[test]
fn private_declarations_are_invisible_across_modules() {
    let files = [
        (
            "main.cres",
            "import \"util.cres\";\n@init { jsfx.spl0 = util.hidden(); }",
        ),
        ("util.cres", "float hidden() { return 1.0; }"),
    ];
    let err = compile_sources("main.cres", &files).expect_err("expected private access error");
    assert_eq!(
        err.rendered_message(),
        "Declaration \"hidden\" in module \"util\" is private"
    );
}

#[test]
fn desc_and_inputs_emit_the_plugin_header() {
    let output = compile_one(
        "desc [description: \"Gain\", tags: \"utility\", in_pins: [pin: \"left\"], out_pins: [], options: [no_meter: true]];\n\
         input gain [default_value: 0.5, min: 0, max: 1, description: \"Amount\"];\n\
         @sample { jsfx.spl0 = jsfx.spl0 * gain.value; }",
    );
    assert!(output.starts_with("desc:Gain\n"), "got: {output}");
    assert!(output.contains("tags:utility"), "got: {output}");
    assert!(output.contains("slider1:0.5<0,1,0>Amount"), "got: {output}");
    assert!(output.contains("in_pin:left"), "got: {output}");
    assert!(output.contains("out_pin:none"), "got: {output}");
    assert!(output.contains("options:no_meter"), "got: {output}");
    assert!(output.contains("slider1"), "got: {output}");
}

#[test]
fn input_members_fold_to_literals() {
    let output = compile_one(
        "input gain [default_value: 0.25, min: 0, max: 1];\n@init { jsfx.spl0 = gain.default + gain.sliderNumber; }",
    );
    assert!(output.contains("0.25"), "got: {output}");
}

#[test]
fn gfx_section_emits_dimensions() {
    let output = compile_one("@gfx [width: 400, height: 300] { gfx.r = 1; }");
    assert!(output.contains("@gfx 400 300"), "got: {output}");
    assert!(output.contains("gfx_r = 1;"), "got: {output}");
}

#[test]
fn block_expressions_outline_and_reinline() {
    let output = compile_one("@init { int x = int { return 2 + 3; }; jsfx.spl0 = x; }");
    // single-use block expressions come back inline; no synthetic function
    // remains
    assert!(!output.contains("block_expression"), "got: {output}");
}

#[test]
fn default_arguments_fill_at_call_sites() {
    let output = compile_one(
        "float scale(float x, float by = 2.0) { return x * by; }\n@init { jsfx.spl0 = scale(3.0); }",
    );
    assert!(output.contains("function scale_"), "got: {output}");
    assert!(output.contains("2.0"), "got: {output}");
}

#[test]
fn variadic_externals_accept_extra_arguments() {
    let output = compile_one("@init { str.sprintf(0, \"value: %d\", 42); }");
    assert!(output.contains("sprintf(0, \"value: %d\", 42);"), "got: {output}");
}

#[test]
fn calling_a_variadic_with_too_few_arguments_is_rejected() {
    let err = compile_err("@init { str.sprintf(0); }");
    assert_eq!(
        err,
        "Could not find overload for function \"sprintf\" with 1 parameter(s)"
    );
}

#[test]
fn not_all_paths_return_is_rejected() {
    let err = compile_err("int f(int x) { if (x > 0) return 1; }\n@init { jsfx.spl0 = f(1); }");
    assert_eq!(err, "Not all control paths return a value");
}

#[test]
fn builtin_helpers_compile_through_their_module() {
    let output = compile_one("@sample { jsfx.spl0 = math.lerp(0.0, 1.0, 0.25); }");
    assert!(output.contains("function lerp_"), "got: {output}");
}

#[test]
fn struct_parameters_flatten_into_leaves() {
    let output = compile_one(
        "public struct Color { float red; float green; float blue; }\n\
         float sum(Color c) { return c.red + c.green + c.blue; }\n\
         Color tint;\n\
         @init { tint.red = 0.5; tint.green = 0.25; tint.blue = 0.125; }\n\
         @sample { jsfx.spl0 = sum(tint); }",
    );
    assert!(output.contains("function sum_"), "got: {output}");
    assert!(output.contains("tint_red_"), "got: {output}");
    // three leaf arguments at the call site
    let call_at = output.find("sum_").and_then(|i| output[i..].find('(').map(|j| i + j));
    assert!(call_at.is_some(), "got: {output}");
}

#[test]
fn struct_returns_read_through_the_return_slot() {
    let output = compile_one(
        "public struct Pair { float a; float b; }\n\
         Pair make(float x) { Pair p; p.a = x; p.b = x * 2; return p; }\n\
         @init { Pair q = make(1.5); jsfx.spl0 = q.a + q.b; }",
    );
    assert!(output.contains("__returnValue_"), "got: {output}");
    assert!(output.contains("function make_"), "got: {output}");
}
