use itags::{Members, NodeId, Plugin, Runtime};

use runtime_::{runtime, unmount, Log};

struct Recorder(Log);

impl Plugin for Recorder {
	fn activate(&self, runtime: &mut Runtime, node: NodeId) {
		self.0.push("activate");
		runtime.set_attribute(node, "data-active", "").unwrap();
	}

	fn deactivate(&self, runtime: &mut Runtime, node: NodeId) {
		self.0.push("deactivate");
		runtime.remove_attribute(node, "data-active").unwrap();
	}
}

fn hosted(runtime: &mut Runtime, log: &Log) -> (NodeId, NodeId, NodeId) {
	runtime.define_component("x-host", Members::new(), true);
	runtime.define_plugin("recorder", Recorder(log.clone()));

	let outer = runtime.create_element("x-host");
	let inner = runtime.create_element("x-host");
	let target = runtime.create_element("div");
	runtime.set_attribute(target, "plugin-recorder", "").unwrap();
	runtime.append_child(inner, target).unwrap();
	runtime.append_child(outer, inner).unwrap();
	let body = runtime.body();
	runtime.append_child(body, outer).unwrap();
	runtime.tick();
	(outer, inner, target)
}

#[test]
fn plugins_activate_when_their_host_renders() {
	let mut runtime = runtime();
	let log = Log::default();
	let (_, inner, target) = hosted(&mut runtime, &log);

	assert!(runtime.is_rendered(inner));
	assert!(runtime.is_plugin_active(target, "recorder"));
	assert_eq!(runtime.attribute(target, "data-active"), Some(""));
}

#[test]
fn nested_hosts_share_one_activation() {
	let mut runtime = runtime();
	let log = Log::default();
	let (outer, inner, target) = hosted(&mut runtime, &log);
	assert_eq!(log.entries(), ["activate"]);

	// Re-rendering doesn't take another reference.
	assert!(runtime.render_ui(outer));
	assert_eq!(log.entries(), ["activate"]);

	let body = runtime.body();
	runtime.append_child(body, inner).unwrap();
	runtime.tick();
	assert!(runtime.is_rendered(inner));
	assert_eq!(log.entries(), ["activate"]);

	unmount(&mut runtime, outer);
	assert!(runtime.is_destroyed(outer));
	assert!(runtime.is_plugin_active(target, "recorder"), "the inner host still holds it");
	assert_eq!(log.entries(), ["activate"]);

	unmount(&mut runtime, inner);
	assert!(!runtime.is_plugin_active(target, "recorder"));
	assert_eq!(log.entries(), ["activate", "deactivate"]);
	assert_eq!(runtime.attribute(target, "data-active"), None);
}

#[test]
fn unknown_plugins_are_ignored() {
	let mut runtime = runtime();
	runtime.define_component("x-host", Members::new(), true);

	let host = runtime.create_element("x-host");
	let target = runtime.create_element("span");
	runtime.set_attribute(target, "plugin-missing", "").unwrap();
	runtime.append_child(host, target).unwrap();
	let body = runtime.body();
	runtime.append_child(body, host).unwrap();
	runtime.tick();

	assert!(runtime.is_rendered(host));
	assert!(!runtime.is_plugin_active(target, "missing"));
	unmount(&mut runtime, host);
	assert!(runtime.is_destroyed(host));
}
