//! End-to-end resolution scenarios through the parser and both search
//! directions.

use weft_resolve::cost::Cost;
use weft_resolve::resolver::{ResolveFailure, Resolver, SearchDir};
use weft_resolve::ConversionGraph;
use weft_ast::ty::Ty;

const DIRS: [SearchDir; 2] = [SearchDir::TopDown, SearchDir::BottomUp];

/// Parses an input and resolves every expression, returning the outcomes.
fn run(src: &str, dir: SearchDir) -> Vec<Result<(Ty, Cost), ResolveFailure>> {
    let program = weft_parser::parse_input(src).expect("input parses");
    let conversions = ConversionGraph::make_conversions(program.types.iter());
    let mut resolver = Resolver::new(&conversions, &program.funcs, dir);
    program
        .exprs
        .iter()
        .map(|e| {
            resolver
                .resolve_expr(e)
                .map(|i| (i.env.replace(i.type_of()), i.cost))
        })
        .collect()
}

#[test]
fn overload_by_return_type() {
    let src = "2 f 1\n3 f 1\n%%\nf( 1 )\n";
    for dir in DIRS {
        match &run(src, dir)[0] {
            Err(ResolveFailure::Ambiguous(alts)) => {
                assert_eq!(alts.len(), 2);
                assert!(alts.iter().all(|a| a.cost == Cost::zero()));
                let mut tys: Vec<String> =
                    alts.iter().map(|a| a.type_of().to_string()).collect();
                tys.sort();
                assert_eq!(tys, vec!["2", "3"]);
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }
    }
}

#[test]
fn safe_conversion_on_argument() {
    let src = "1 f 2\n%%\nf( 1 )\n";
    for dir in DIRS {
        let out = run(src, dir);
        let (ty, cost) = out[0].as_ref().expect("resolves with a safe conversion");
        assert_eq!(ty, &Ty::Conc(1));
        assert_eq!(*cost, Cost::from_safe(1));
    }
}

#[test]
fn polymorphic_assertion_binds() {
    let src = "T g T | T f T\n2 f 2\n%%\ng( 2 )\n";
    for dir in DIRS {
        let out = run(src, dir);
        let (ty, cost) = out[0].as_ref().expect("assertion satisfied");
        assert_eq!(ty, &Ty::Conc(2));
        assert_eq!(cost.vars, 1);
    }
}

#[test]
fn conflicting_variable_bindings_do_not_match() {
    let src = "[ T T : T T ] h T T\n%%\nh( 1 2 )\n";
    for dir in DIRS {
        assert!(
            matches!(&run(src, dir)[0], Err(ResolveFailure::Invalid)),
            "h(1 2) must fail: T cannot be both 1 and 2"
        );
    }
}

#[test]
fn conversion_to_void_at_top_level() {
    let src = "f 3\n%%\nf( 3 )\n";
    for dir in DIRS {
        let out = run(src, dir);
        let (ty, cost) = out[0].as_ref().expect("void call resolves");
        assert_eq!(ty, &Ty::Void);
        assert_eq!(*cost, Cost::zero());
    }
}

#[test]
fn assertion_selects_matching_overload() {
    let src = "T f T | T g T\n1 g 1\n2 g 2\n%%\nf( 1 )\n";
    for dir in DIRS {
        let out = run(src, dir);
        let (ty, _) = out[0].as_ref().expect("unique binding with T = 1");
        assert_eq!(ty, &Ty::Conc(1));
    }
}

#[test]
fn search_directions_agree_on_monomorphic_inputs() {
    let src = "\
2 f 1
1 g 2
3 h 1 2
%%
f( 1 )
g( f( 1 ) )
h( 1 2 )
h( 1 1 )
";
    let td = run(src, SearchDir::TopDown);
    let bu = run(src, SearchDir::BottomUp);
    assert_eq!(td.len(), bu.len());
    for (a, b) in td.iter().zip(&bu) {
        match (a, b) {
            (Ok((ta, ca)), Ok((tb, cb))) => {
                assert_eq!(ta, tb);
                assert_eq!(ca, cb);
            }
            (Err(_), Err(_)) => {}
            other => panic!("directions disagree: {other:?}"),
        }
    }
}

#[test]
fn generic_named_types_unify_parameters() {
    let src = "#box<T> wrap T\n2 use #box<2>\n%%\nuse( wrap( 2 ) )\n";
    for dir in DIRS {
        let out = run(src, dir);
        let (ty, _) = out[0].as_ref().expect("generic type flows through");
        assert_eq!(ty, &Ty::Conc(2));
    }
}

#[test]
fn variable_reference_takes_function_type() {
    let src = "2 f 1\n2 apply [ 2 : 1 ] 1\n%%\napply( &f 1 )\n";
    for dir in DIRS {
        let out = run(src, dir);
        let (ty, cost) = out[0].as_ref().expect("function value accepted");
        assert_eq!(ty, &Ty::Conc(2));
        assert_eq!(*cost, Cost::zero());
    }
}
