// Golden tests for the monomorphizing transformer: full source in, full
// printed source out. The expected strings are written against the
// printer's canonical format (tabs, no column alignment).

use migoc::check::check_file;
use migoc::importer::StdImporter;
use migoc::parser::parse_file;
use migoc::printer::print_file;
use migoc::transform::transform_file;

fn transform_source(src: &str) -> String {
    let file = parse_file(src).expect("source parses");
    let mut importer = StdImporter::new();
    let checked = check_file(&file, &mut importer);
    assert!(
        checked.is_ok(),
        "unexpected diagnostics: {:?}",
        checked.diagnostics
    );
    let transformed = transform_file(&file, &checked).expect("transform succeeds");
    print_file(&transformed)
}

fn assert_transforms(src: &str, expected: &str) {
    let got = transform_source(src);
    assert_eq!(
        got, expected,
        "\n--- got ---\n{}\n--- expected ---\n{}\n",
        got, expected
    );
}

#[test]
fn unused_generics_are_dropped() {
    // A generic declared but never instantiated yields no output
    // declaration at all.
    let src = "package main\n\ntype T[U] struct{}\n\nfunc f[T](x T) {}\n\nfunc (T[U]) f0() {}\n\nfunc (T) f1() {}\n\nfunc main() {\n}\n";
    let expected = "package main\n\nfunc main() {}\n";
    assert_transforms(src, expected);
}

#[test]
fn struct_literals_with_type_args() {
    let src = "package main\n\ntype Box[T] struct {\n\tval T\n}\n\nvar _ = Box[string]{}\n\nvar _ = &Box[int]{}\n\nfunc main() {\n}\n";
    let expected = "package main\n\ntype (\n\tBox__int struct {\n\t\tval int\n\t}\n\tBox__string struct {\n\t\tval string\n\t}\n)\n\nvar _ = Box__string{}\n\nvar _ = &Box__int{}\n\nfunc main() {}\n";
    assert_transforms(src, expected);
}

#[test]
fn literal_forms() {
    let src = "package main\n\n\
type Box[T] struct {\n\tval T\n}\n\n\
type Tuple[T, U] struct {\n\tfirst T\n\tsecond U\n}\n\n\
type Map[T, U] struct {\n\tm map[T]U\n}\n\n\
func main() {\n\
\tvar _ = Box[string]{}\n\
\tvar _ = &Box[int]{}\n\
\tvar _ = []Box[string]{}\n\
\tvar _ = [2]Box[int]{}\n\
\tvar _ = map[string]Box[string]{}\n\
\tvar _ = Map[string, int]{}\n\
\tvar _ = Tuple[int, string]{\n\t\tfirst: 2,\n\t\tsecond: \"foo\",\n\t}\n\
}\n";
    let expected = "package main\n\n\
type (\n\tBox__int struct {\n\t\tval int\n\t}\n\tBox__string struct {\n\t\tval string\n\t}\n)\n\n\
type Tuple__int__string struct {\n\tfirst int\n\tsecond string\n}\n\n\
type Map__string__int struct {\n\tm map[string]int\n}\n\n\
func main() {\n\
\tvar _ = Box__string{}\n\
\tvar _ = &Box__int{}\n\
\tvar _ = []Box__string{}\n\
\tvar _ = [2]Box__int{}\n\
\tvar _ = map[string]Box__string{}\n\
\tvar _ = Map__string__int{}\n\
\tvar _ = Tuple__int__string{\n\t\tfirst: 2,\n\t\tsecond: \"foo\",\n\t}\n\
}\n";
    assert_transforms(src, expected);
}

#[test]
fn selector_in_type_argument() {
    // Mangling turns `.` into `_`.
    let src = "package main\n\nimport \"bytes\"\n\ntype Box[T] struct {\n\tval T\n}\n\nvar _ = Box[bytes.Buffer]{}\n\nfunc main() {\n}\n";
    let expected = "package main\n\nimport \"bytes\"\n\ntype Box__bytes_Buffer struct {\n\tval bytes.Buffer\n}\n\nvar _ = Box__bytes_Buffer{}\n\nfunc main() {}\n";
    assert_transforms(src, expected);
}

#[test]
fn methods_on_generic_receiver() {
    let src = "package main\n\n\
type A[T] T\n\n\
func (a A[T]) f0() T {\n\tvar x T\n\treturn x\n}\n\n\
func (a A[T]) f1() T {\n\treturn T(a)\n}\n\n\
func (*A) f3() {}\n\n\
func main() {\n\tvar _ = A[string](\"\")\n\tvar _ = A[bool](true)\n}\n";
    let expected = "package main\n\n\
type (\n\tA__bool bool\n\tA__string string\n)\n\n\
func (a A__bool) f0() bool {\n\tvar x bool\n\treturn x\n}\n\n\
func (a A__string) f0() string {\n\tvar x string\n\treturn x\n}\n\n\
func (a A__bool) f1() bool {\n\treturn bool(a)\n}\n\n\
func (a A__string) f1() string {\n\treturn string(a)\n}\n\n\
func (*A__bool) f3() {}\n\n\
func (*A__string) f3() {}\n\n\
func main() {\n\tvar _ = A__string(\"\")\n\tvar _ = A__bool(true)\n}\n";
    assert_transforms(src, expected);
}

#[test]
fn generic_method_specialization() {
    // The specialized method keeps only its own type arguments in the
    // mangled name; the receiver is expanded to the usage's concrete
    // receiver.
    let src = "package main\n\n\
type A[T] T\n\n\
func (a A[T]) f2[U, V]() (T, U, V) {\n\tvar x U\n\tvar y V\n\treturn T(a), x, y\n}\n\n\
func main() {\n\tvar x A[uint]\n\tx.f2[float64, int8]()\n}\n";
    let expected = "package main\n\n\
type A__uint uint\n\n\
func (a A__uint) f2__float64__int8() (uint, float64, int8) {\n\tvar x float64\n\tvar y int8\n\treturn uint(a), x, y\n}\n\n\
func main() {\n\tvar x A__uint\n\tx.f2__float64__int8()\n}\n";
    assert_transforms(src, expected);
}

#[test]
fn generic_method_on_plain_receiver() {
    let src = "package main\n\n\
type Counter int\n\n\
func (c Counter) add[T](x T) T {\n\treturn x\n}\n\n\
func main() {\n\tvar c Counter\n\tc.add[int](1)\n\tc.add[string](\"s\")\n}\n";
    let expected = "package main\n\n\
type Counter int\n\n\
func (c Counter) add__int(x int) int {\n\treturn x\n}\n\n\
func (c Counter) add__string(x string) string {\n\treturn x\n}\n\n\
func main() {\n\tvar c Counter\n\tc.add__int(1)\n\tc.add__string(\"s\")\n}\n";
    assert_transforms(src, expected);
}

#[test]
fn inherited_parameters_in_types() {
    let src = "package main\n\n\
type Tuple[T, U] struct {\n\tfirst T\n\tsecond U\n}\n\n\
type Boxed[T, U] struct {\n\tv Tuple[T, U]\n}\n\n\
var _ = Boxed[string, int]{}\n\n\
func main() {\n}\n";
    let expected = "package main\n\n\
type Tuple__string__int struct {\n\tfirst string\n\tsecond int\n}\n\n\
type Boxed__string__int struct {\n\tv Tuple__string__int\n}\n\n\
var _ = Boxed__string__int{}\n\n\
func main() {}\n";
    assert_transforms(src, expected);
}

#[test]
fn inherited_parameters_in_functions() {
    let src = "package main\n\n\
type Tuple[T, U] struct {\n\tfirst T\n\tsecond U\n}\n\n\
func NewTuple[T, U](first T, second U) Tuple[T, U] {\n\
\treturn Tuple[T, U]{\n\t\tfirst: first,\n\t\tsecond: second,\n\t}\n}\n\n\
func NewTupleString[T](first string, second T) Tuple[string, T] {\n\
\treturn Tuple[string, T]{\n\t\tfirst: first,\n\t\tsecond: second,\n\t}\n}\n\n\
func main() {\n\tvar _ = NewTuple[bool, int64](true, 42)\n\tvar _ = NewTupleString[float64](\"foo\", 12.34)\n}\n";
    let expected = "package main\n\n\
type (\n\tTuple__bool__int64 struct {\n\t\tfirst bool\n\t\tsecond int64\n\t}\n\tTuple__string__float64 struct {\n\t\tfirst string\n\t\tsecond float64\n\t}\n)\n\n\
func NewTuple__bool__int64(first bool, second int64) Tuple__bool__int64 {\n\
\treturn Tuple__bool__int64{\n\t\tfirst: first,\n\t\tsecond: second,\n\t}\n}\n\n\
func NewTupleString__float64(first string, second float64) Tuple__string__float64 {\n\
\treturn Tuple__string__float64{\n\t\tfirst: first,\n\t\tsecond: second,\n\t}\n}\n\n\
func main() {\n\tvar _ = NewTuple__bool__int64(true, 42)\n\tvar _ = NewTupleString__float64(\"foo\", 12.34)\n}\n";
    assert_transforms(src, expected);
}

#[test]
fn generic_functions() {
    let src = "package main\n\n\
func Print[T](t T) {\n\tprintln(t)\n}\n\n\
func MakeSlice[T]() []T {\n\treturn make([]T, 0)\n}\n\n\
func main() {\n\tPrint[int](5)\n\tPrint[int](42)\n\tPrint[string](\"foo\")\n\tMakeSlice[string]()\n}\n";
    let expected = "package main\n\n\
func Print__int(t int) {\n\tprintln(t)\n}\n\n\
func Print__string(t string) {\n\tprintln(t)\n}\n\n\
func MakeSlice__string() []string {\n\treturn make([]string, 0)\n}\n\n\
func main() {\n\tPrint__int(5)\n\tPrint__int(42)\n\tPrint__string(\"foo\")\n\tMakeSlice__string()\n}\n";
    assert_transforms(src, expected);
}

#[test]
fn generic_types_in_signatures() {
    let src = "package main\n\n\
type Either[T, U] struct {\n\tleft T\n\tright U\n}\n\n\
func getData() Either[int, string] {\n\treturn Either[int, string]{}\n}\n\n\
func handleEither(e Either[error, string]) {\n}\n\n\
func main() {\n}\n";
    let expected = "package main\n\n\
type (\n\tEither__error__string struct {\n\t\tleft error\n\t\tright string\n\t}\n\tEither__int__string struct {\n\t\tleft int\n\t\tright string\n\t}\n)\n\n\
func getData() Either__int__string {\n\treturn Either__int__string{}\n}\n\n\
func handleEither(e Either__error__string) {}\n\n\
func main() {}\n";
    assert_transforms(src, expected);
}

#[test]
fn type_switch_and_assert() {
    let src = "package main\n\n\
type Box[T] struct {\n\tval T\n}\n\n\
func main() {\n\
\tvar x interface{} = Box[int]{}\n\
\tswitch x.(type) {\n\tcase Box[int]:\n\tcase Box[string]:\n\t}\n\
\t_ = x.(Box[int])\n\
}\n";
    let expected = "package main\n\n\
type (\n\tBox__int struct {\n\t\tval int\n\t}\n\tBox__string struct {\n\t\tval string\n\t}\n)\n\n\
func main() {\n\
\tvar x interface{} = Box__int{}\n\
\tswitch x.(type) {\n\tcase Box__int:\n\tcase Box__string:\n\t}\n\
\t_ = x.(Box__int)\n\
}\n";
    assert_transforms(src, expected);
}

#[test]
fn partial_realized_after_enclosing_instantiation() {
    let src = "package main\n\n\
type Box[T] struct {\n\tval T\n}\n\n\
func Wrap[U](u U) Box[U] {\n\treturn Box[U]{\n\t\tval: u,\n\t}\n}\n\n\
func main() {\n\tvar _ = Wrap[int](5)\n}\n";
    let expected = "package main\n\n\
type Box__int struct {\n\tval int\n}\n\n\
func Wrap__int(u int) Box__int {\n\treturn Box__int{\n\t\tval: u,\n\t}\n}\n\n\
func main() {\n\tvar _ = Wrap__int(5)\n}\n";
    assert_transforms(src, expected);
}

#[test]
fn partial_without_enclosing_usage_stays_dead() {
    // The nested Box[U] is only realized when Wrap itself is instantiated;
    // with no usages both disappear.
    let src = "package main\n\n\
type Box[T] struct {\n\tval T\n}\n\n\
func Wrap[U](u U) Box[U] {\n\treturn Box[U]{\n\t\tval: u,\n\t}\n}\n\n\
func main() {\n}\n";
    let expected = "package main\n\nfunc main() {}\n";
    assert_transforms(src, expected);
}

#[test]
fn single_parameter_array_ambiguity() {
    // `T[N]` where N is not a declared constant resolves to a
    // one-parameter generic; a constant bound stays an array type.
    let src = "package main\n\n\
const N = 3\n\n\
type Vec [N]int\n\n\
type List[E] []E\n\n\
var _ Vec\n\n\
var _ = List[string]{}\n\n\
func main() {\n}\n";
    let expected = "package main\n\n\
const N = 3\n\n\
type Vec [N]int\n\n\
type List__string []string\n\n\
var _ Vec\n\n\
var _ = List__string{}\n\n\
func main() {}\n";
    assert_transforms(src, expected);
}

#[test]
fn output_is_deterministic() {
    let src = "package main\n\n\
type Box[T] struct {\n\tval T\n}\n\n\
func Print[T](t T) {\n\tprintln(t)\n}\n\n\
func main() {\n\
\tvar _ = Box[string]{}\n\
\tvar _ = Box[int]{}\n\
\tPrint[int](1)\n\
\tPrint[string](\"a\")\n\
}\n";
    let first = transform_source(src);
    let second = transform_source(src);
    assert_eq!(first, second);
}

#[test]
fn same_arguments_share_one_specialization() {
    // Two sites at type-equivalent arguments yield one declaration and the
    // same mangled identifier.
    let src = "package main\n\n\
type Box[T] struct {\n\tval T\n}\n\n\
func main() {\n\tvar _ = Box[int]{}\n\tvar _ = Box[int]{}\n}\n";
    let out = transform_source(src);
    assert_eq!(out.matches("type Box__int struct").count(), 1);
    assert_eq!(out.matches("Box__int{}").count(), 2);
}
