//! Property tests for the Fourier-Motzkin backend over boxes cut by a
//! diagonal half-space, where feasibility has a closed form.

use proptest::prelude::*;

use spacer_smt::backends::fourier_motzkin::FourierMotzkinSolver;
use spacer_smt::solver::{SatResult, SmtSolver};
use spacer_smt::sorts::SmtSort;
use spacer_smt::terms::SmtTerm;

fn fm_proptest_config() -> ProptestConfig {
    ProptestConfig {
        cases: 64,
        ..ProptestConfig::default()
    }
}

fn r(name: &str) -> SmtTerm {
    SmtTerm::real_const(name)
}

fn boxed(lx: i64, hx: i64, ly: i64, hy: i64, s: i64) -> Vec<SmtTerm> {
    vec![
        r("x").ge(SmtTerm::int(lx)),
        r("x").le(SmtTerm::int(hx)),
        r("y").ge(SmtTerm::int(ly)),
        r("y").le(SmtTerm::int(hy)),
        r("x").add(r("y")).le(SmtTerm::int(s)),
    ]
}

proptest! {
    #![proptest_config(fm_proptest_config())]

    #[test]
    fn verdict_matches_closed_form(
        lx in -8i64..8, hx in -8i64..8,
        ly in -8i64..8, hy in -8i64..8,
        s in -20i64..20,
    ) {
        let terms = boxed(lx, hx, ly, hy, s);
        let mut solver = FourierMotzkinSolver::new();
        solver.declare_var("x", &SmtSort::Real).unwrap();
        solver.declare_var("y", &SmtSort::Real).unwrap();
        for t in &terms {
            solver.assert(t).unwrap();
        }
        let (res, model) = solver
            .check_sat_with_model(&[("x", &SmtSort::Real), ("y", &SmtSort::Real)])
            .unwrap();

        let feasible = lx <= hx && ly <= hy && lx + ly <= s;
        if feasible {
            prop_assert_eq!(res, SatResult::Sat);
            let model = model.expect("sat result carries a model");
            for t in &terms {
                prop_assert!(model.is_true(t), "{} not satisfied", t);
            }
        } else {
            prop_assert_eq!(res, SatResult::Unsat);
        }
    }
}
