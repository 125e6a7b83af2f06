// User-visible checker diagnostics, one group per error kind.

use migoc::check::{check_file, Checked};
use migoc::importer::StdImporter;
use migoc::parser::parse_file;

fn check_src(src: &str) -> Checked {
    let file = parse_file(src).expect("source parses");
    let mut importer = StdImporter::new();
    check_file(&file, &mut importer)
}

fn assert_has_error(src: &str, message: &str) {
    let checked = check_src(src);
    assert!(
        checked.diagnostics.iter().any(|d| d.message == message),
        "expected {:?} among {:?}",
        message,
        checked.diagnostics
    );
}

mod arity {
    use super::*;

    #[test]
    fn too_few_type_arguments() {
        assert_has_error(
            "package main\n\ntype Tuple[T, U] struct {\n\tfirst T\n\tsecond U\n}\n\nvar _ = Tuple[int]{}\n\nfunc main() {\n}\n",
            "wrong number of type arguments (expected 2 but got 1)",
        );
    }

    #[test]
    fn too_many_type_arguments() {
        assert_has_error(
            "package main\n\nfunc Print[T](t T) {}\n\nfunc main() {\n\tPrint[int, string](5)\n}\n",
            "wrong number of type arguments (expected 1 but got 2)",
        );
    }
}

mod missing_arguments {
    use super::*;

    #[test]
    fn bare_generic_in_literal() {
        assert_has_error(
            "package main\n\ntype Box[T] struct {\n\tval T\n}\n\nvar _ = Box{}\n\nfunc main() {\n}\n",
            "missing type arguments for type Box",
        );
    }

    #[test]
    fn bare_generic_as_annotation() {
        assert_has_error(
            "package main\n\ntype Box[T] struct {\n\tval T\n}\n\nvar x Box\n\nfunc main() {\n}\n",
            "missing type arguments for type Box",
        );
    }

    #[test]
    fn bare_generic_function_call() {
        assert_has_error(
            "package main\n\nfunc Print[T](t T) {}\n\nfunc main() {\n\tPrint(5)\n}\n",
            "missing type arguments for type func(T)",
        );
    }
}

mod unsupported {
    use super::*;

    #[test]
    fn generic_interface() {
        assert_has_error(
            "package main\n\ntype I[T] interface{}\n\nfunc main() {\n}\n",
            "generic interface types are not supported",
        );
    }

    #[test]
    fn generic_main() {
        assert_has_error(
            "package main\n\nfunc main[T]() {\n}\n",
            "func main must have no type parameters",
        );
    }

    #[test]
    fn main_with_signature() {
        assert_has_error(
            "package main\n\nfunc main(x int) int {\n\treturn x\n}\n",
            "func main must have no arguments and no return values",
        );
    }

    #[test]
    fn init_with_signature() {
        assert_has_error(
            "package main\n\nfunc init(x int) {\n}\n\nfunc main() {\n}\n",
            "func init must have no arguments and no return values",
        );
    }

    #[test]
    fn receiver_on_undeclared_type() {
        let checked = check_src(
            "package main\n\nfunc (g Ghost) f() {\n}\n\nfunc main() {\n}\n",
        );
        assert!(checked
            .diagnostics
            .iter()
            .any(|d| d.message == "invalid receiver type Ghost (undeclared name)"));
    }

    #[test]
    fn bracketed_receiver_on_plain_type() {
        assert_has_error(
            "package main\n\ntype A int\n\nfunc (a A[T]) f() {\n}\n\nfunc main() {\n}\n",
            "A is not a generic type",
        );
    }
}

mod shadowing {
    use super::*;

    #[test]
    fn parameter_shadows_its_declaration() {
        assert_has_error(
            "package main\n\ntype Box[Box, T] struct {\n\tval T\n}\n\nfunc main() {\n}\n",
            "type parameter Box shadows its enclosing declaration",
        );
    }

    #[test]
    fn single_bracketed_name_resolving_to_a_type_is_an_array_bound() {
        // `type Box[Box]` keeps the array reading because the bracketed
        // name resolves; the bound is then rejected as non-constant.
        assert_has_error(
            "package main\n\ntype Box[Box] struct{}\n\nfunc main() {\n}\n",
            "invalid array bound Box",
        );
    }

    #[test]
    fn redeclared_type_parameter() {
        assert_has_error(
            "package main\n\ntype Pair[T, T] struct {\n\tval T\n}\n\nfunc main() {\n}\n",
            "T redeclared in this block",
        );
    }
}

mod resolution {
    use super::*;

    #[test]
    fn undeclared_name() {
        assert_has_error(
            "package main\n\nfunc main() {\n\tprintln(zzz)\n}\n",
            "undeclared name: zzz",
        );
    }

    #[test]
    fn redeclaration() {
        assert_has_error(
            "package main\n\nvar x = 1\n\nvar x = 2\n\nfunc main() {\n}\n",
            "x redeclared in this block",
        );
    }

    #[test]
    fn unknown_import() {
        let checked = check_src(
            "package main\n\nimport \"no/such/pkg\"\n\nfunc main() {\n}\n",
        );
        assert!(checked
            .diagnostics
            .iter()
            .any(|d| d.message.starts_with("could not import no/such/pkg")));
    }

    #[test]
    fn unknown_package_member() {
        assert_has_error(
            "package main\n\nimport \"bytes\"\n\nvar _ = bytes.Ghost\n\nfunc main() {\n}\n",
            "undefined: bytes.Ghost",
        );
    }

    #[test]
    fn unknown_struct_field_in_literal() {
        assert_has_error(
            "package main\n\ntype Box[T] struct {\n\tval T\n}\n\nfunc main() {\n\tvar _ = Box[int]{\n\t\tghost: 1,\n\t}\n}\n",
            "unknown field ghost in struct literal of type Box[int]",
        );
    }

    #[test]
    fn field_and_method_collision() {
        assert_has_error(
            "package main\n\ntype Box[T] struct {\n\tval T\n}\n\nfunc (b Box[T]) val() {\n}\n\nfunc main() {\n}\n",
            "field and method with the same name val",
        );
    }

    #[test]
    fn duplicate_method() {
        assert_has_error(
            "package main\n\ntype A int\n\nfunc (a A) f() {\n}\n\nfunc (a A) f() {\n}\n\nfunc main() {\n}\n",
            "method f already declared for A",
        );
    }
}

mod recovery {
    use super::*;

    #[test]
    fn checking_continues_past_errors() {
        // Both errors surface in one pass.
        let checked = check_src(
            "package main\n\ntype Box[T] struct {\n\tval T\n}\n\nvar _ = Box{}\n\nfunc main() {\n\tprintln(zzz)\n}\n",
        );
        assert!(checked
            .diagnostics
            .iter()
            .any(|d| d.message == "missing type arguments for type Box"));
        assert!(checked
            .diagnostics
            .iter()
            .any(|d| d.message == "undeclared name: zzz"));
    }

    #[test]
    fn valid_usages_survive_unrelated_errors() {
        let checked = check_src(
            "package main\n\ntype Box[T] struct {\n\tval T\n}\n\nvar _ = Box[int]{}\n\nfunc main() {\n\tprintln(zzz)\n}\n",
        );
        assert_eq!(checked.registry.get("Box").unwrap().usages.len(), 1);
    }
}
