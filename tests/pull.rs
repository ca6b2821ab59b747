mod common;

use std::collections::BTreeSet;

use assert_matches::assert_matches;

use campaign_finance_puller::domain::{Cycle, ResourceKind};
use campaign_finance_puller::error::PullError;
use campaign_finance_puller::pull::{self, Dispatcher};
use campaign_finance_puller::store::DataLayout;

use common::{MockClient, NoopSink, Reply, cid, temp_layout, write_file};

fn write_rosters(layout: &DataLayout) {
    write_file(
        &layout.rosters_dir().join("AK.csv"),
        "cid,firstlast,office\nN00000001,A One,AK01\nN00000002,A Two,AKS1\nN00000003,A Three,AKS2\n",
    );
    write_file(
        &layout.rosters_dir().join("NJ.csv"),
        "cid,firstlast,office\nN00000004,N Four,NJ01\nN00000005,N Five,NJS1\n",
    );
}

fn cycle() -> Option<Cycle> {
    Some("2022".parse().unwrap())
}

#[test]
fn pulls_every_rostered_candidate() {
    let (_temp, layout) = temp_layout();
    write_rosters(&layout);
    let client = MockClient::default();

    let report = pull::pull_all(
        &client,
        &layout,
        ResourceKind::Sectors,
        cycle(),
        &BTreeSet::new(),
        &NoopSink,
    )
    .unwrap();

    assert_eq!(report.rosters, 2);
    assert_eq!(report.fetched, 5);
    assert!(report.failures.is_empty());
    assert_eq!(
        client.calls(),
        vec!["N00000001", "N00000002", "N00000003", "N00000004", "N00000005"]
    );

    let records =
        DataLayout::read_table(&layout.candidate_path(ResourceKind::Sectors, &cid("N00000004")))
            .unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].get("last_updated"), Some("10/19/2022"));
    assert_eq!(records[0].get("cycle"), Some("2022"));
}

#[test]
fn rerun_makes_no_remote_calls() {
    let (_temp, layout) = temp_layout();
    write_rosters(&layout);

    let first = MockClient::default();
    pull::pull_all(
        &first,
        &layout,
        ResourceKind::Industries,
        cycle(),
        &BTreeSet::new(),
        &NoopSink,
    )
    .unwrap();

    let second = MockClient::default();
    let report = pull::pull_all(
        &second,
        &layout,
        ResourceKind::Industries,
        cycle(),
        &BTreeSet::new(),
        &NoopSink,
    )
    .unwrap();

    assert!(second.calls().is_empty());
    assert_eq!(report.fetched, 0);
    assert_eq!(report.skipped, 5);
}

#[test]
fn known_failures_are_never_requested() {
    let (_temp, layout) = temp_layout();
    write_rosters(&layout);
    let client = MockClient::default();
    let known: BTreeSet<_> = [cid("N00000002"), cid("N00000005")].into_iter().collect();

    let report = pull::pull_all(
        &client,
        &layout,
        ResourceKind::Sectors,
        cycle(),
        &known,
        &NoopSink,
    )
    .unwrap();

    assert_eq!(client.calls(), vec!["N00000001", "N00000003", "N00000004"]);
    assert_eq!(report.skipped, 2);
}

#[test]
fn soft_failures_are_tagged_with_their_roster() {
    let (_temp, layout) = temp_layout();
    write_rosters(&layout);
    let client = MockClient::default()
        .with_reply("N00000002", Reply::NotFound)
        .with_reply("N00000005", Reply::Empty);

    let report = pull::pull_all(
        &client,
        &layout,
        ResourceKind::Sectors,
        cycle(),
        &BTreeSet::new(),
        &NoopSink,
    )
    .unwrap();

    let labels: Vec<String> = report.failures.iter().map(|f| f.label()).collect();
    assert_eq!(labels, vec!["AK_N00000002", "NJ_N00000005"]);
    assert_eq!(report.fetched, 3);
    assert!(
        !layout
            .candidate_path(ResourceKind::Sectors, &cid("N00000002"))
            .as_std_path()
            .exists()
    );
}

#[test]
fn rate_limit_stops_before_later_rosters() {
    let (_temp, layout) = temp_layout();
    write_rosters(&layout);
    let client = MockClient::default()
        .with_reply("N00000001", Reply::NotFound)
        .with_reply("N00000002", Reply::RateLimit);

    let err = pull::pull_all(
        &client,
        &layout,
        ResourceKind::Sectors,
        cycle(),
        &BTreeSet::new(),
        &NoopSink,
    )
    .unwrap_err();

    assert_matches!(
        err,
        PullError::RunAborted { ref failures, .. } if failures == &vec!["AK_N00000001".to_string()]
    );
    assert_eq!(client.calls(), vec!["N00000001", "N00000002"]);
    for id in ["N00000002", "N00000003", "N00000004", "N00000005"] {
        assert!(
            !layout
                .candidate_path(ResourceKind::Sectors, &cid(id))
                .as_std_path()
                .exists()
        );
    }
}

#[test]
fn rate_limit_keeps_earlier_files_and_resumes() {
    let (_temp, layout) = temp_layout();
    write_rosters(&layout);
    let limited = MockClient::default().with_reply("N00000003", Reply::RateLimit);

    let err = pull::pull_all(
        &limited,
        &layout,
        ResourceKind::Summaries,
        cycle(),
        &BTreeSet::new(),
        &NoopSink,
    )
    .unwrap_err();
    assert_matches!(err, PullError::RunAborted { .. });
    for id in ["N00000001", "N00000002"] {
        assert!(
            layout
                .candidate_path(ResourceKind::Summaries, &cid(id))
                .as_std_path()
                .exists()
        );
    }

    let next_day = MockClient::default();
    let report = pull::pull_all(
        &next_day,
        &layout,
        ResourceKind::Summaries,
        cycle(),
        &BTreeSet::new(),
        &NoopSink,
    )
    .unwrap();
    assert_eq!(next_day.calls(), vec!["N00000003", "N00000004", "N00000005"]);
    assert_eq!(report.skipped, 2);
}

#[test]
fn failed_candidate_is_not_retried_within_a_run() {
    let (_temp, layout) = temp_layout();
    std::fs::create_dir_all(layout.resource_dir(ResourceKind::Sectors).as_std_path()).unwrap();
    let client = MockClient::default().with_reply("N00000009", Reply::NotFound);
    let mut dispatcher = Dispatcher::new(
        &client,
        &layout,
        ResourceKind::Sectors,
        cycle(),
        &BTreeSet::new(),
    )
    .unwrap();

    let first = dispatcher
        .dispatch("AK", &[cid("N00000009")], &NoopSink)
        .unwrap();
    let second = dispatcher
        .dispatch("NJ", &[cid("N00000009")], &NoopSink)
        .unwrap();

    assert_eq!(first.len(), 1);
    assert!(second.is_empty());
    assert_eq!(client.calls(), vec!["N00000009"]);
    assert_eq!(dispatcher.skipped(), 1);
}

#[test]
fn skip_set_is_disk_ids_plus_known_failures() {
    let (_temp, layout) = temp_layout();
    let dir = layout.resource_dir(ResourceKind::Industries);
    write_file(&dir.join("N00000001.csv"), "a\n1\n");
    write_file(&dir.join("N00000002.csv"), "a\n1\n");
    write_file(&dir.join(".DS_Store"), "");
    write_file(&dir.join("ALL_CANDIDATES.csv"), "a,cid\n1,N00000001\n");
    let known: BTreeSet<_> = [cid("N00000002"), cid("N00000007")].into_iter().collect();

    let first = pull::skip_set(&layout, ResourceKind::Industries, &known).unwrap();
    let second = pull::skip_set(&layout, ResourceKind::Industries, &known).unwrap();

    let expected: BTreeSet<_> = [cid("N00000001"), cid("N00000002"), cid("N00000007")]
        .into_iter()
        .collect();
    assert_eq!(first, expected);
    assert_eq!(first, second);
}

#[test]
fn missing_roster_directory_is_fatal() {
    let (_temp, layout) = temp_layout();
    let client = MockClient::default();

    let err = pull::pull_all(
        &client,
        &layout,
        ResourceKind::Sectors,
        cycle(),
        &BTreeSet::new(),
        &NoopSink,
    )
    .unwrap_err();

    assert_matches!(err, PullError::MissingDirectory(_));
    assert!(client.calls().is_empty());
}

#[test]
fn contributor_files_carry_cycle_source_and_cid() {
    let (_temp, layout) = temp_layout();
    write_file(
        &layout.rosters_dir().join("NJ.csv"),
        "cid,office\nN00036154,NJ01\n",
    );
    let client = MockClient::default();

    pull::pull_all(
        &client,
        &layout,
        ResourceKind::Contributors,
        cycle(),
        &BTreeSet::new(),
        &NoopSink,
    )
    .unwrap();

    let records = DataLayout::read_table(
        &layout.candidate_path(ResourceKind::Contributors, &cid("N00036154")),
    )
    .unwrap();
    let names: Vec<&str> = records[0].names().collect();
    assert_eq!(
        names,
        vec!["sector_name", "indivs", "pacs", "total", "cycle", "source", "cid"]
    );
    assert_eq!(records[1].get("cid"), Some("N00036154"));
}
