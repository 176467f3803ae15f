mod common;

use std::rc::Rc;

use eels_core::{EelsInterval, IntervalConverter};
use eels_host::{DataItem, DisplayItem, DocumentModel, HostObject};
use eels_quantification::{FIT_INTERVAL_GRAPHICS, QuantificationConfig};
use serde_json::json;

use common::{Session, assert_fraction_eq, edge};

#[test]
fn showing_an_edge_creates_its_artifacts() {
    let session = Session::new(2048);
    let (quantification, display) = session.quantification_display();
    let edge = edge((400.0, 420.0), &[(300.0, 350.0), (450.0, 500.0)]);
    display.add_eels_edge(Rc::clone(&edge)).unwrap();

    display.show_eels_edge(&edge).unwrap();

    let processing_id = QuantificationConfig::default().processing_id;
    assert_eq!(quantification.len(), 1);
    assert_eq!(session.document.data_item_count(), 3);
    assert_eq!(session.display_item.graphic_count(), 3);
    assert_eq!(session.document.computations_with(&processing_id).len(), 1);

    let shown = display.get_eels_edge_display_for_eels_edge(&edge).unwrap();
    let signal = shown.signal_interval_graphic().unwrap();
    assert_fraction_eq(signal.interval(), (400.0 / 2048.0, 420.0 / 2048.0));
    assert_eq!(shown.fit_interval_graphics().len(), 2);
    assert_eq!(
        shown.background_data_item().map(|item| item.title()),
        Some("EELS Spectrum Background".to_owned())
    );
}

#[test]
fn removing_a_middle_fit_interval_keeps_the_outer_graphics() {
    let session = Session::new(2048);
    let (_quantification, display) = session.quantification_display();
    let edge = edge(
        (400.0, 420.0),
        &[(100.0, 150.0), (200.0, 250.0), (300.0, 350.0)],
    );
    display.add_eels_edge(Rc::clone(&edge)).unwrap();
    display.show_eels_edge(&edge).unwrap();
    let shown = display.get_eels_edge_display_for_eels_edge(&edge).unwrap();
    let before = shown.fit_interval_graphics();

    let removed = edge.remove_fit_eels_interval(1).unwrap();

    assert_eq!(removed, EelsInterval::from_bounds(200.0, 250.0));
    let after = shown.fit_interval_graphics();
    assert_eq!(after.len(), 2);
    assert_eq!(after[0].id(), before[0].id());
    assert_eq!(after[1].id(), before[2].id());
    assert_fraction_eq(after[0].interval(), (100.0 / 2048.0, 150.0 / 2048.0));
    assert_fraction_eq(after[1].interval(), (300.0 / 2048.0, 350.0 / 2048.0));
    assert_eq!(session.display_item.graphic_count(), 3);

    let computation = shown.computation().unwrap();
    let inputs: Vec<_> = computation
        .objects(FIT_INTERVAL_GRAPHICS)
        .iter()
        .map(|object| object.id())
        .collect();
    assert_eq!(inputs, vec![before[0].id(), before[2].id()]);
}

#[test]
fn deleting_the_signal_graphic_hides_the_edge() {
    let session = Session::new(2048);
    let (quantification, display) = session.quantification_display();
    let edge = edge((400.0, 420.0), &[(300.0, 350.0), (450.0, 500.0)]);
    display.add_eels_edge(Rc::clone(&edge)).unwrap();
    display.show_eels_edge(&edge).unwrap();
    let shown = display.get_eels_edge_display_for_eels_edge(&edge).unwrap();
    let signal = shown.signal_interval_graphic().unwrap();

    session.display_item().remove_graphic(&*signal);

    assert!(!display.is_eels_edge_visible(&edge));
    assert!(display.eels_edge_displays().is_empty());
    assert!(!shown.is_shown());
    assert_eq!(session.display_item.graphic_count(), 0);
    assert_eq!(session.document.computation_count(), 0);
    assert_eq!(session.document.data_item_count(), 1);
    assert_eq!(quantification.len(), 1);
    let record = display.data_structure().unwrap();
    assert_eq!(
        record.property(eels_quantification::EELS_EDGE_DISPLAYS),
        Some(json!([]))
    );
}

#[test]
fn hide_is_idempotent_after_host_cascades() {
    let session = Session::new(2048);
    let (_quantification, display) = session.quantification_display();
    let edge = edge((400.0, 420.0), &[(300.0, 350.0)]);
    display.add_eels_edge(Rc::clone(&edge)).unwrap();
    display.show_eels_edge(&edge).unwrap();
    let shown = display.get_eels_edge_display_for_eels_edge(&edge).unwrap();

    let computation = shown.computation().unwrap();
    session.host.remove_computation(&*computation);

    assert!(!display.is_eels_edge_visible(&edge));
    display.hide_eels_edge(&edge);
    shown.hide(session.host.as_ref(), &*session.display_item);
    shown.hide(session.host.as_ref(), &*session.display_item);
    assert_eq!(session.display_item.graphic_count(), 0);
    assert_eq!(session.document.data_item_count(), 1);

    // Nothing is bound any more.
    edge.set_signal_eels_interval(Some(EelsInterval::from_bounds(10.0, 20.0)));
    edge.append_fit_eels_interval(EelsInterval::from_bounds(1.0, 5.0));
    assert_eq!(session.display_item.graphic_count(), 0);
}

#[test]
fn graphics_and_edge_stay_in_step_while_shown() {
    let session = Session::new(1000);
    let (_quantification, display) = session.quantification_display();
    let edge = edge((400.0, 420.0), &[(300.0, 350.0)]);
    display.add_eels_edge(Rc::clone(&edge)).unwrap();
    display.show_eels_edge(&edge).unwrap();
    let shown = display.get_eels_edge_display_for_eels_edge(&edge).unwrap();

    shown
        .signal_interval_graphic()
        .unwrap()
        .set_interval((0.5, 0.55));
    let signal = edge.signal_eels_interval().unwrap();
    assert!((signal.start_ev.unwrap() - 500.0).abs() < 1e-9);
    assert!((signal.end_ev.unwrap() - 550.0).abs() < 1e-9);

    edge.insert_fit_eels_interval(0, EelsInterval::from_bounds(100.0, 200.0))
        .unwrap();
    let graphics = shown.fit_interval_graphics();
    assert_eq!(graphics.len(), 2);
    assert_fraction_eq(graphics[0].interval(), (0.1, 0.2));

    graphics[1].set_interval((0.6, 0.7));
    assert_eq!(
        edge.fit_eels_interval(1),
        Some(IntervalConverter::new(1000, session.spectrum.calibration())
            .unwrap()
            .convert_back((0.6, 0.7)))
    );
}

#[test]
fn user_drawn_interval_becomes_a_shown_edge() {
    let session = Session::new(1000);
    let (quantification, display) = session.quantification_display();
    let drawn = session.display_item().add_interval_graphic();
    drawn.set_interval((0.4, 0.5));

    let edge = display
        .add_eels_edge_from_interval_graphic(Rc::clone(&drawn))
        .unwrap();

    assert_eq!(quantification.eels_edges()[0].uuid(), edge.uuid());
    let fits = edge.fit_eels_intervals();
    assert!((fits[0].start_ev.unwrap() - 320.0).abs() < 1e-9);
    assert!((fits[0].end_ev.unwrap() - 360.0).abs() < 1e-9);
    assert!((fits[1].start_ev.unwrap() - 550.0).abs() < 1e-9);
    assert!((fits[1].end_ev.unwrap() - 600.0).abs() < 1e-9);
    assert_eq!(session.display_item.graphic_count(), 3);

    // The drawn graphic now drives the edge.
    drawn.set_interval((0.45, 0.5));
    let signal = edge.signal_eels_interval().unwrap();
    assert!((signal.start_ev.unwrap() - 450.0).abs() < 1e-9);
}
