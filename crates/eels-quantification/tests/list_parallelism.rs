mod common;

use std::rc::Rc;

use eels_core::{EelsInterval, IntervalConverter};
use eels_host::{DataItem, HostObject};
use eels_quantification::FIT_INTERVAL_GRAPHICS;
use proptest::prelude::*;

use common::{Session, TOLERANCE, edge};

const DATA_LEN: usize = 2048;

#[derive(Clone, Debug)]
enum Op {
    Insert(usize, f64, f64),
    Remove(usize),
    Set(usize, f64, f64),
    MoveGraphic(usize, f64, f64),
}

fn op() -> impl Strategy<Value = Op> {
    let ev = 0.0..2048.0f64;
    let fraction = 0.0..1.0f64;
    prop_oneof![
        (any::<usize>(), ev.clone(), ev.clone()).prop_map(|(i, a, b)| Op::Insert(i, a, b)),
        any::<usize>().prop_map(Op::Remove),
        (any::<usize>(), ev.clone(), ev).prop_map(|(i, a, b)| Op::Set(i, a, b)),
        (any::<usize>(), fraction.clone(), fraction).prop_map(|(i, a, b)| Op::MoveGraphic(i, a, b)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn fit_graphics_mirror_fit_intervals(ops in prop::collection::vec(op(), 1..24)) {
        let session = Session::new(DATA_LEN);
        let (_quantification, display) = session.quantification_display();
        let edge = edge((400.0, 420.0), &[(300.0, 350.0), (450.0, 500.0)]);
        display.add_eels_edge(Rc::clone(&edge)).unwrap();
        display.show_eels_edge(&edge).unwrap();
        let shown = display.get_eels_edge_display_for_eels_edge(&edge).unwrap();
        let converter = IntervalConverter::new(DATA_LEN, session.spectrum.calibration()).unwrap();

        for op in ops {
            let len = edge.fit_eels_interval_count();
            match op {
                Op::Insert(i, a, b) => {
                    edge.insert_fit_eels_interval(i % (len + 1), EelsInterval::from_bounds(a, b))
                        .unwrap();
                }
                Op::Remove(i) if len > 0 => {
                    edge.remove_fit_eels_interval(i % len).unwrap();
                }
                Op::Set(i, a, b) if len > 0 => {
                    edge.set_fit_eels_interval(i % len, EelsInterval::from_bounds(a, b))
                        .unwrap();
                }
                Op::MoveGraphic(i, a, b) if len > 0 => {
                    shown.fit_interval_graphics()[i % len].set_interval((a, b));
                }
                _ => {}
            }

            let intervals = edge.fit_eels_intervals();
            let graphics = shown.fit_interval_graphics();
            prop_assert_eq!(graphics.len(), intervals.len());
            for (graphic, interval) in graphics.iter().zip(&intervals) {
                let expected = converter.convert(interval).unwrap();
                let actual = graphic.interval();
                prop_assert!((actual.0 - expected.0).abs() < TOLERANCE, "{:?} != {:?}", actual, expected);
                prop_assert!((actual.1 - expected.1).abs() < TOLERANCE, "{:?} != {:?}", actual, expected);
            }

            let inputs: Vec<_> = shown
                .computation()
                .unwrap()
                .objects(FIT_INTERVAL_GRAPHICS)
                .iter()
                .map(|object| object.id())
                .collect();
            let ids: Vec<_> = graphics.iter().map(|graphic| graphic.id()).collect();
            prop_assert_eq!(inputs, ids);
        }

        // Signal graphic plus one per fit interval.
        prop_assert_eq!(
            session.display_item.graphic_count(),
            edge.fit_eels_interval_count() + 1
        );
    }
}
