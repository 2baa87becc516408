mod common;

use common::Fixture;
use pwcontrol_lib::graph::{ObjectType, PortDirection};
use pwcontrol_lib::ControlError;
use std::collections::HashSet;

#[test]
fn test_create_exists_delete_by_name() {
    let fx = Fixture::new();
    let links = fx.plane.links();

    let before = links.exists("player:output_FL", "alsa_output.usb-dac:playback_FL").unwrap();
    assert!(!before.exists);
    assert_eq!(before.link_id, None);

    let id = links
        .create("player:output_FL", "alsa_output.usb-dac:playback_FL")
        .unwrap();
    let after = links.exists("player:output_FL", "alsa_output.usb-dac:playback_FL").unwrap();
    assert!(after.exists);
    assert_eq!(after.link_id, Some(id));

    // creating the same link again returns the existing one
    assert_eq!(
        links.create("player:output_FL", "alsa_output.usb-dac:playback_FL").unwrap(),
        id
    );
    assert_eq!(fx.graph.link_count(), 1);

    let removed = links
        .delete_by_name("player:output_FL", "alsa_output.usb-dac:playback_FL")
        .unwrap();
    assert_eq!(removed, id);
    assert!(!links.exists("player:output_FL", "alsa_output.usb-dac:playback_FL").unwrap().exists);
}

#[test]
fn test_create_by_ids_and_delete_by_id() {
    let fx = Fixture::new();
    let links = fx.plane.links();
    let out = links.list_ports(Some(PortDirection::Output)).unwrap();
    let inp = links.list_ports(Some(PortDirection::Input)).unwrap();
    let out_fr = out.iter().find(|p| p.port_name == "output_FR").unwrap();
    let in_fr = inp.iter().find(|p| p.port_name == "playback_FR").unwrap();

    let id = links
        .create(&out_fr.id.to_string(), &in_fr.id.to_string())
        .unwrap();
    fx.plane.graph().refresh().unwrap();
    let listed = links.list_links().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, id);
    assert_eq!(listed[0].output_port_name, "player:output_FR");
    assert_eq!(listed[0].input_port_name, "alsa_output.usb-dac:playback_FR");

    links.delete(id).unwrap();
    assert_eq!(fx.graph.link_count(), 0);
    assert!(matches!(links.delete(id), Err(ControlError::NotFound(_))));
}

#[test]
fn test_endpoint_errors() {
    let fx = Fixture::new();
    let links = fx.plane.links();
    assert!(matches!(
        links.create("", "alsa_output.usb-dac:playback_FL"),
        Err(ControlError::Validation(_))
    ));
    assert!(matches!(
        links.create("nope:out", "alsa_output.usb-dac:playback_FL"),
        Err(ControlError::NotFound(_))
    ));
    // an input port on the output side
    assert!(matches!(
        links.create("alsa_output.usb-dac:playback_FL", "alsa_output.usb-dac:playback_FR"),
        Err(ControlError::Validation(_))
    ));
    assert!(matches!(
        links.delete_by_name("player:output_FL", "alsa_output.usb-dac:playback_FL"),
        Err(ControlError::NotFound(_))
    ));
}

#[test]
fn test_listing_ids_unique_and_filtered() {
    let fx = Fixture::new();
    let all = fx.plane.graph().list(None);
    let ids: HashSet<u32> = all.iter().map(|o| o.id).collect();
    assert_eq!(ids.len(), all.len());

    let nodes = fx.plane.graph().list(Some(ObjectType::Node));
    assert!(nodes.iter().all(|o| o.object_type == ObjectType::Node));
    assert!(nodes.iter().any(|o| o.name == "speakereq2x2"));

    assert!(matches!(fx.plane.graph().get(9999), Err(ControlError::NotFound(_))));
    assert_eq!(fx.plane.graph().get(fx.sink).unwrap().name, "alsa_output.usb-dac");
}

#[test]
fn test_listing_changes_only_on_refresh() {
    let fx = Fixture::new();
    let count = fx.plane.graph().list(None).len();
    fx.graph.add_node("late", "Audio/Sink");
    assert_eq!(fx.plane.graph().list(None).len(), count);
    assert_eq!(fx.plane.graph().refresh().unwrap(), count + 1);
    assert!(fx.plane.graph().find_by_name("late").is_some());
}

#[test]
fn test_dot_rendering_of_cached_graph() {
    let fx = Fixture::new();
    fx.plane
        .links()
        .create("player:output_FL", "alsa_output.usb-dac:playback_FL")
        .unwrap();
    fx.plane.graph().refresh().unwrap();

    let dot = fx.plane.render_dot();
    assert!(dot.starts_with("digraph"));
    assert!(dot.contains("cluster_devices"));
    assert!(dot.contains(&format!("node_{}", fx.sink)));
}
