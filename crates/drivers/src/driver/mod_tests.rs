// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use strmsync_core::DataServerKind;

fn sample_server(kind: DataServerKind) -> DataServer {
    DataServer {
        id: DataServerId::new("ds-1"),
        name: "server".to_string(),
        kind,
        host: "127.0.0.1".to_string(),
        port: 8080,
        credentials: Vec::new(),
        options: serde_json::json!({}),
        enabled: true,
        created_at_ms: 0,
        updated_at_ms: 0,
    }
}

#[test]
fn factory_builds_the_kind_matching_the_data_server() {
    let local = DriverFactory::build(&sample_server(DataServerKind::Local), b"");
    assert_eq!(local.kind(), DriverKind::Local);

    let cd2 = DriverFactory::build(&sample_server(DataServerKind::CloudDrive2), b"token");
    assert_eq!(cd2.kind(), DriverKind::CloudDrive2);

    let openlist = DriverFactory::build(&sample_server(DataServerKind::OpenList), b"token");
    assert_eq!(openlist.kind(), DriverKind::OpenList);

    let webdav = DriverFactory::build(&sample_server(DataServerKind::WebDav), b"user:pass");
    assert_eq!(webdav.kind(), DriverKind::WebDav);
}

#[test]
fn default_compare_strm_delegates_to_the_shared_rule_table() {
    let fake = super::FakeDriver::new();
    let info = fake.build_strm_info(BuildStrmRequest {
        data_server_id: DataServerId::new("ds"),
        remote_path: "a.mkv".to_string(),
        remote_meta: RemoteEntry {
            path: "/a.mkv".to_string(),
            name: "a.mkv".to_string(),
            size: 1,
            mod_time: 0,
            is_dir: false,
        },
    });
    let outcome = fake.compare_strm(&info, "", 0);
    assert!(outcome.need_update);
    assert_eq!(outcome.reason, "empty");
}
