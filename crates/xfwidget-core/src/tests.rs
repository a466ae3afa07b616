use std::path::{Path, PathBuf};

use super::*;

fn ids(values: &[u32]) -> Vec<PluginId> {
    values
        .iter()
        .map(|value| PluginId::new(*value).expect("test ids are positive"))
        .collect()
}

fn raw_ids(list: &PanelPluginList) -> Vec<u32> {
    list.ids().iter().map(|id| id.get()).collect()
}

#[test]
fn next_plugin_id_is_one_past_the_maximum() {
    assert_eq!(next_plugin_id(ids(&[1, 3, 4])).get(), 5);
    assert_eq!(next_plugin_id(ids(&[9, 2])).get(), 10);
}

#[test]
fn next_plugin_id_starts_at_one_for_empty_store() {
    assert_eq!(next_plugin_id(Vec::new()).get(), 1);
}

#[test]
fn plugin_id_rejects_zero() {
    assert!(PluginId::new(0).is_none());
    assert_eq!(PluginId::new(7).map(PluginId::store_path).as_deref(), Some("/plugins/plugin-7"));
}

#[test]
fn plugin_root_id_only_matches_plugin_roots() {
    assert_eq!(plugin_root_id("/plugins/plugin-12"), PluginId::new(12));
    assert_eq!(plugin_root_id("/plugins/plugin-12/style"), None);
    assert_eq!(plugin_root_id("/plugins/plugin-"), None);
    assert_eq!(plugin_root_id("/plugins/plugin-1x"), None);
    assert_eq!(plugin_root_id("/panels/panel-1"), None);
}

#[test]
fn plugin_id_in_path_matches_sub_properties() {
    assert_eq!(plugin_id_in_path("/plugins/plugin-3/expand"), PluginId::new(3));
    assert_eq!(plugin_id_in_path("/plugins/plugin-3"), PluginId::new(3));
    assert_eq!(plugin_id_in_path("/plugins/clock-font"), None);
}

#[test]
fn parse_store_listing_splits_verbose_rows() {
    let raw = "/plugins/plugin-1                 whiskermenu\n/plugins/plugin-2   cpugraph\n/plugins/plugin-2/mode  0\n\n";
    let entries = parse_store_listing(raw, true);
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].path, "/plugins/plugin-1");
    assert_eq!(entries[0].value.as_deref(), Some("whiskermenu"));
    assert_eq!(entries[1].value.as_deref(), Some("cpugraph"));
    assert_eq!(entries[2].path, "/plugins/plugin-2/mode");
}

#[test]
fn parse_store_listing_plain_keeps_paths_only() {
    let entries = parse_store_listing("/plugins/plugin-4\n/plugins/plugin-4/style\n", false);
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|entry| entry.value.is_none()));
}

#[test]
fn parse_int_lines_skips_array_header() {
    let raw = "Value is an array with 3 items:\n\n2\n4\n7\n";
    assert_eq!(parse_int_lines(raw), vec![2, 4, 7]);
    assert_eq!(parse_plugin_id_lines("0\n5\n"), ids(&[5]));
}

#[test]
fn splice_then_insert_preserves_visual_position() {
    let mut list = PanelPluginList::new(ids(&[2, 4, 7, 9]));
    let index = list.splice_out(&ids(&[4]));
    assert_eq!(index, Some(1));
    assert_eq!(raw_ids(&list), vec![2, 7, 9]);

    list.insert_at(index, &ids(&[10, 11]));
    assert_eq!(raw_ids(&list), vec![2, 10, 11, 7, 9]);
}

#[test]
fn splice_out_reports_none_when_absent() {
    let mut list = PanelPluginList::new(ids(&[1, 2]));
    assert_eq!(list.splice_out(&ids(&[5])), None);
    assert_eq!(raw_ids(&list), vec![1, 2]);
}

#[test]
fn splice_out_removes_every_target() {
    let mut list = PanelPluginList::new(ids(&[1, 5, 2, 6, 3]));
    assert_eq!(list.splice_out(&ids(&[6, 5])), Some(1));
    assert_eq!(raw_ids(&list), vec![1, 2, 3]);
}

#[test]
fn insert_defaults_to_end_and_clamps_index() {
    let mut list = PanelPluginList::new(ids(&[1, 2]));
    list.insert_at(None, &ids(&[3]));
    list.insert_at(Some(99), &ids(&[4]));
    assert_eq!(raw_ids(&list), vec![1, 2, 3, 4]);
}

#[test]
fn insert_never_duplicates_ids() {
    let mut list = PanelPluginList::new(ids(&[1, 2, 3, 4]));
    list.insert_at(Some(3), &ids(&[2, 9, 9]));
    assert_eq!(raw_ids(&list), vec![1, 3, 2, 9, 4]);

    let deduped = PanelPluginList::new(ids(&[5, 5, 6]));
    assert_eq!(raw_ids(&deduped), vec![5, 6]);
}

#[test]
fn genmon_rc_uses_milliseconds_and_label_flag() {
    let mut config = GenmonConfig::new("/home/kali/.config/bin/vpnip.sh");
    config.text = "VPN".to_string();
    let rendered = config.render().expect("must render");
    assert_eq!(
        rendered,
        "Command=/home/kali/.config/bin/vpnip.sh\nUpdatePeriod=250\nText=VPN\nUseLabel=0\nFont=Cantarell Ultra-Bold 10\n"
    );

    config.use_label = true;
    config.update_period_secs = 2.0;
    let rendered = config.render().expect("must render");
    assert!(rendered.contains("UpdatePeriod=2000\n"));
    assert!(rendered.contains("UseLabel=1\n"));
}

#[test]
fn genmon_rc_rejects_multiline_values() {
    let mut config = GenmonConfig::new("echo hi\nrm -rf ~");
    assert!(config.render().is_err());
    config.command = "echo hi".to_string();
    config.update_period_secs = 0.0;
    assert!(config.render().is_err());
}

#[test]
fn genmon_rc_file_name_uses_plugin_id() {
    let id = PluginId::new(14).expect("positive");
    assert_eq!(genmon_rc_file_name(id), "genmon-14.rc");
}

#[test]
fn target_accepts_plain_ipv4() {
    let spec = TargetSpec::parse("192.168.1.100", "Web").expect("valid target");
    assert_eq!(spec.line(), "192.168.1.100 Web\n");
}

#[test]
fn target_rejects_five_octets_as_format_error() {
    assert_eq!(
        TargetSpec::parse("192.168.1.1.1", "Web"),
        Err(TargetError::InvalidFormat("192.168.1.1.1".to_string()))
    );
    assert!(matches!(
        validate_target_ip("10.0.0.x"),
        Err(TargetError::InvalidFormat(_))
    ));
    assert!(matches!(
        validate_target_ip("1000.1.1.1"),
        Err(TargetError::InvalidFormat(_))
    ));
}

#[test]
fn target_rejects_out_of_range_octet() {
    assert_eq!(
        validate_target_ip("256.1.1.1"),
        Err(TargetError::InvalidAddress("256.1.1.1".to_string()))
    );
}

#[test]
fn target_rejects_leading_zero() {
    assert_eq!(
        validate_target_ip("192.168.01.1"),
        Err(TargetError::InvalidAddress("192.168.01.1".to_string()))
    );
    assert!(validate_target_ip("10.0.0.0").is_ok());
}

#[test]
fn target_requires_name() {
    assert_eq!(TargetSpec::parse("10.10.10.10", ""), Err(TargetError::Usage));
    assert_eq!(TargetSpec::parse("", "Box"), Err(TargetError::Usage));
}

#[test]
fn target_line_round_trips_through_parser() {
    let spec = TargetSpec::parse_line("10.10.11.5 DC01\n").expect("valid line");
    assert_eq!(spec.address.to_string(), "10.10.11.5");
    assert_eq!(spec.name, "DC01");
    assert!(TargetSpec::parse_line("garbage").is_none());
}

#[test]
fn settarget_block_is_fenced_and_quotes_target_path() {
    let block = render_settarget_block(Path::new("/home/kali/.config/bin/target/target.txt"));
    assert!(block.starts_with('\n'));
    assert!(block.contains(SETTARGET_START_MARKER));
    assert!(block.trim_end().ends_with(SETTARGET_END_MARKER));
    assert!(block.contains("local target_file=\"/home/kali/.config/bin/target/target.txt\""));
    assert!(contains_settarget_block(&block));
}

#[test]
fn settarget_block_escapes_shell_metacharacters() {
    let block = render_settarget_block(Path::new("/home/we$ird\"user/target.txt"));
    assert!(block.contains("local target_file=\"/home/we\\$ird\\\"user/target.txt\""));
}

#[test]
fn settarget_detection_accepts_signature_without_marker() {
    assert!(contains_settarget_block("alias ll='ls -l'\nfunction settarget() {\n}\n"));
    assert!(!contains_settarget_block("alias ll='ls -l'\n"));
}

#[test]
fn remove_appended_block_removes_exact_text_only() {
    let block = "\n# start\nfoo\n# end\n";
    let content = format!("export A=1\n{block}");
    assert_eq!(
        remove_appended_block(&content, block).as_deref(),
        Some("export A=1\n")
    );
    assert_eq!(remove_appended_block("export A=1\n# start\nfoo edited\n", block), None);
}

#[test]
fn action_serializes_with_kind_tag() {
    let action = Action::FileAppended {
        path: PathBuf::from("/home/kali/.zshrc"),
        appended_text: "\nblock\n".to_string(),
    };
    let encoded = serde_json::to_string(&action).expect("must serialize");
    assert!(encoded.contains("\"kind\":\"file_appended\""));
    let decoded: Action = serde_json::from_str(&encoded).expect("must deserialize");
    assert_eq!(decoded, action);
    assert_eq!(decoded.kind(), "file_appended");
}

#[test]
fn action_rejects_zero_plugin_id() {
    let err = serde_json::from_str::<Action>("{\"kind\":\"panel_plugin_created\",\"id\":0}");
    assert!(err.is_err());
}

#[test]
fn default_config_matches_stock_install() {
    let config = InstallerConfig::default();
    config.validate().expect("defaults must validate");
    assert_eq!(config.packages, vec!["jp2a", "xclip"]);
    assert_eq!(config.monitors.len(), 3);
    assert_eq!(
        config.required_scripts(),
        vec!["target.sh", "ethernet.sh", "vpnip.sh"]
    );
}

#[test]
fn config_from_toml_overrides_selected_fields() {
    let raw = r#"
packages = ["xclip"]
step_delay_ms = 500

[timeouts]
command_secs = 10

[[monitors]]
script = "target.sh"
text = "TGT"
use_label = true

[[monitors]]
script = "uptime.sh"
update_period_secs = 5.0
"#;
    let config = InstallerConfig::from_toml_str(raw).expect("config should parse");
    assert_eq!(config.packages, vec!["xclip"]);
    assert_eq!(config.step_delay_ms, 500);
    assert_eq!(config.timeouts.command_secs, 10);
    assert_eq!(config.timeouts.package_secs, 900);
    assert_eq!(config.monitors[0].text, "TGT");
    assert_eq!(config.monitors[0].font(), DEFAULT_GENMON_FONT);
    assert_eq!(config.monitors[1].update_period_secs, 5.0);
    assert!(config.required_scripts().contains(&"uptime.sh"));
}

#[test]
fn config_rejects_path_like_scripts_and_unknown_fields() {
    let err = InstallerConfig::from_toml_str("[[monitors]]\nscript = \"../evil.sh\"\n")
        .expect_err("path traversal must be rejected");
    assert!(err.to_string().contains("plain file name"), "unexpected error: {err}");

    assert!(InstallerConfig::from_toml_str("colour = \"red\"\n").is_err());
    assert!(InstallerConfig::from_toml_str("packages = [\"-oops\"]\n").is_err());
    assert!(InstallerConfig::from_toml_str("monitors = []\n").is_err());
}
