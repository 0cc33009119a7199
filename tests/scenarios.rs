use std::cell::RefCell;
use std::rc::Rc;

use ixa_crossborder::interventions::PartialEdgeRemovalConfig;
use ixa_crossborder::network::weights::RegionKey;
use ixa_crossborder::{
    build_population, synthesize_cross_layers, Context, ContextInterventionsExt,
    ContextMobilityExt, ContextNetworkExt, ContextPeopleExt, ContextPopulationExt,
    ContextRandomExt, CrossLayerConfig, ExecutionPhase, HashSet, InterventionConfig,
    InterventionState, LayerKey, MobilityConfig, PersonId, Population, PopulationConfig,
    TravelEvent,
};
use serde_json::json;

fn population(size: usize, regions: serde_json::Value, layers: serde_json::Value) -> Population {
    let config: PopulationConfig = serde_json::from_value(json!({
        "size": size,
        "seed": 12,
        "regions": regions,
        "layers": layers,
    }))
    .unwrap();
    build_population(&config).unwrap()
}

fn cross_config(traveler_fraction: f64, edges_per_traveler: usize) -> CrossLayerConfig {
    serde_json::from_value(json!({
        "traveler_fraction": traveler_fraction,
        "edges_per_traveler": edges_per_traveler,
        "seed": 31,
    }))
    .unwrap()
}

#[test]
fn two_regions_get_a_cross_layer() {
    let mut population = population(
        1000,
        json!({ "A": 2, "B": 1 }),
        json!([{ "name": "base", "kind": "preferential_attachment", "connectivity": 3 }]),
    );
    let summary = synthesize_cross_layers(&mut population, &cross_config(0.03, 2)).unwrap();

    let people = population.people();
    let a = people.regions().id_of("A").unwrap();
    assert_eq!(people.people_from(a).len(), 667);
    let crossers = people.iter().filter(|&p| people.is_crosser(p)).count();
    assert!((28..=30).contains(&crossers));
    assert_eq!(summary.crossers.iter().map(|(_, n)| n).sum::<usize>(), crossers);

    let cross = population.network().get_layer(&LayerKey::Cross).unwrap();
    assert_eq!(cross.len(), crossers * 2);
    for edge in cross.edges() {
        assert_ne!(people.country(edge.source), people.country(edge.target));
        assert!(people.is_crosser(edge.source) ^ people.is_crosser(edge.target));
    }
    let base = population.network().get_layer(&LayerKey::Base).unwrap();
    assert!(base
        .edges()
        .iter()
        .all(|edge| people.country(edge.source) == people.country(edge.target)));
}

#[test]
fn crossers_travel_and_come_back() {
    let mut population = population(
        1000,
        json!({ "A": 1, "B": 1 }),
        json!([{ "name": "community", "kind": "random", "connectivity": 3 }]),
    );
    synthesize_cross_layers(&mut population, &cross_config(0.1, 2)).unwrap();

    let mut context = Context::new();
    context.init_random(2024);
    context.install_population(population).unwrap();
    let crossers = context
        .people()
        .iter()
        .filter(|&p| context.is_crosser(p))
        .count();
    assert_eq!(crossers, 100);
    context
        .install_mobility(MobilityConfig {
            travel_fraction: 0.1,
            ..MobilityConfig::default()
        })
        .unwrap();

    // A host process checking that only crossers ever leave home.
    let strays = Rc::new(RefCell::new(0));
    let seen = Rc::clone(&strays);
    context.add_daily_process(
        move |context| {
            let people = context.people();
            *seen.borrow_mut() += people
                .iter()
                .filter(|&p| !people.is_crosser(p) && people.is_away(p))
                .count();
        },
        ExecutionPhase::Last,
    );
    context.execute_days(10);
    assert_eq!(*strays.borrow(), 0);

    let ledger = context.get_travel_ledger();
    assert!(ledger
        .iter()
        .any(|event| matches!(event, TravelEvent::Departure { .. })));
    for (index, event) in ledger.iter().enumerate() {
        let TravelEvent::Return { day, person } = *event else {
            continue;
        };
        let due = ledger[..index].iter().rev().find_map(|earlier| match *earlier {
            TravelEvent::Departure {
                person: p,
                return_day,
                ..
            } if p == person => Some(return_day),
            _ => None,
        });
        assert_eq!(due, Some(day));
        assert!(day <= 10);
    }
}

#[test]
fn partial_removal_restores_the_same_edges() {
    let population = population(
        1000,
        json!({ "A": 1, "B": 1 }),
        json!([{ "name": "base", "kind": "random", "connectivity": 2 }]),
    );
    let mut context = Context::new();
    context.init_random(8);
    context.install_population(population).unwrap();
    let a = context.get_regions().id_of("A").unwrap();

    let edges_in_a = |context: &Context| -> HashSet<(PersonId, PersonId)> {
        context
            .get_layer(&LayerKey::Base)
            .unwrap()
            .edges()
            .iter()
            .filter(|edge| context.get_person_country(edge.source) == a)
            .map(|edge| (edge.source, edge.target))
            .collect()
    };
    let before = edges_in_a(&context);
    assert_eq!(before.len(), 1000);

    let id = context
        .add_intervention(InterventionConfig::PartialEdgeRemoval(
            PartialEdgeRemovalConfig {
                layer: LayerKey::Base,
                region: "A".to_string(),
                fraction: 0.5,
                start_day: 1,
                end_day: Some(3),
                seed: Some(5),
                region_key: RegionKey::Country,
            },
        ))
        .unwrap();

    context.execute_days(2);
    let during = edges_in_a(&context);
    assert_eq!(during.len(), 500);
    assert!(during.is_subset(&before));
    assert_eq!(context.get_layer(&LayerKey::Base).unwrap().len(), 1500);
    assert_eq!(
        context.get_intervention_state(id),
        Some(InterventionState::Active)
    );

    context.execute_days(2);
    assert_eq!(edges_in_a(&context), before);
    assert_eq!(
        context.get_intervention_state(id),
        Some(InterventionState::Restored)
    );
    assert!(context
        .get_layer(&LayerKey::Base)
        .unwrap()
        .edges()
        .iter()
        .all(|edge| (edge.weight - 1.0).abs() < f32::EPSILON));
}
