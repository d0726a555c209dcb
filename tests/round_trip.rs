//! End-to-end round trips: one server, one or more client requests, files
//! on disk at the end.

mod common;

use common::{client_config, read_batch_files, spawn_server};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use workload_relay::protocol::header::{
    RFD_HEADER_LEN, RFW_HEADER_LEN, RfdFrame, RfwHeader, decode_rfd,
};
use workload_relay::protocol::payload::{decode_rfd_payload, encode_rfw};
use workload_relay::{MetricsMask, Protocol, RequestSpec, Rfw, WorkloadClient};

fn spec(protocol: &str, batch_unit: u32, batch_id: u32, batch_size: u32) -> RequestSpec {
    RequestSpec::single(
        protocol,
        "DVD-training",
        0b1101,
        batch_unit,
        batch_id,
        batch_size,
    )
}

#[tokio::test]
async fn json_round_trip_writes_every_batch_file() {
    let (addr, shutdown) = spawn_server(1000).await;
    let dir = tempfile::tempdir().expect("tempdir");

    let client = WorkloadClient::new(client_config(addr, dir.path()));
    let summary = client
        .run(vec![spec("JSON", 100, 0, 5)], CancellationToken::new())
        .await
        .expect("client run");

    assert_eq!(summary.completed, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.files_written, 5);
    assert_eq!(summary.write_failures, 0);

    let files = read_batch_files(dir.path());
    assert_eq!(
        files.iter().map(|(id, _)| *id).collect::<Vec<_>>(),
        vec![0, 1, 2, 3, 4]
    );
    for (batch_id, contents) in &files {
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some("cpu,net_in,memory"));
        let rows: Vec<&str> = lines.collect();
        assert_eq!(rows.len(), 100);
        let first = (batch_id * 100) as i64;
        assert_eq!(
            rows[0],
            format!("{},{},{}", first, 1000 + first, first as f64 / 2.0)
        );
    }

    shutdown.cancel();
}

#[tokio::test]
async fn binary_round_trip_decodes_to_the_same_values() {
    let (addr, shutdown) = spawn_server(1000).await;
    let json_dir = tempfile::tempdir().expect("tempdir");
    let buff_dir = tempfile::tempdir().expect("tempdir");

    let json_client = WorkloadClient::new(client_config(addr, json_dir.path()));
    let json_summary = json_client
        .run(vec![spec("JSON", 50, 1, 4)], CancellationToken::new())
        .await
        .expect("json run");
    let buff_client = WorkloadClient::new(client_config(addr, buff_dir.path()));
    let buff_summary = buff_client
        .run(vec![spec("BUFF", 50, 1, 4)], CancellationToken::new())
        .await
        .expect("buff run");

    assert_eq!(json_summary.files_written, 4);
    assert_eq!(buff_summary.files_written, 4);

    let json_files = read_batch_files(json_dir.path());
    let buff_files = read_batch_files(buff_dir.path());
    assert_eq!(json_files.len(), buff_files.len());
    for ((json_id, json_contents), (buff_id, buff_contents)) in
        json_files.iter().zip(buff_files.iter())
    {
        assert_eq!(json_id, buff_id);
        assert_eq!(json_contents, buff_contents);
    }

    shutdown.cancel();
}

#[tokio::test]
async fn early_termination_completes_with_fewer_files() {
    let (addr, shutdown) = spawn_server(250).await;
    let dir = tempfile::tempdir().expect("tempdir");

    let client = WorkloadClient::new(client_config(addr, dir.path()));
    let summary = client
        .run(vec![spec("JSON", 100, 0, 5)], CancellationToken::new())
        .await
        .expect("client run");

    // The request still counts as completed.
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.files_written, 3);

    let files = read_batch_files(dir.path());
    let row_counts: Vec<usize> = files
        .iter()
        .map(|(_, contents)| contents.lines().count() - 1)
        .collect();
    assert_eq!(row_counts, vec![100, 100, 50]);

    shutdown.cancel();
}

#[tokio::test]
async fn concurrent_requests_write_independent_file_sets() {
    let (addr, shutdown) = spawn_server(1000).await;
    let dir = tempfile::tempdir().expect("tempdir");

    let client = WorkloadClient::new(client_config(addr, dir.path()));
    let summary = client
        .run(
            vec![spec("JSON", 20, 0, 3), spec("BUFF", 20, 5, 3)],
            CancellationToken::new(),
        )
        .await
        .expect("client run");

    assert_eq!(summary.completed, 2);
    assert_eq!(summary.files_written, 6);

    // Distinct request ids keep the six files from colliding.
    let names: std::collections::HashSet<String> = std::fs::read_dir(dir.path())
        .expect("read dir")
        .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.len(), 6);

    shutdown.cancel();
}

#[tokio::test]
async fn zero_metrics_mask_is_rejected_before_connecting() {
    // No server at all: the driver must fail before any connection.
    let dir = tempfile::tempdir().expect("tempdir");
    let config = client_config("127.0.0.1:1".parse().expect("addr"), dir.path());

    let client = WorkloadClient::new(config);
    let result = client
        .run(
            vec![RequestSpec::single("JSON", "DVD-training", 0, 100, 0, 5)],
            CancellationToken::new(),
        )
        .await;

    assert!(result.is_err());
    assert!(read_batch_files(dir.path()).is_empty());
}

#[tokio::test]
async fn malformed_requests_draw_nops_then_a_valid_one_is_served() {
    let (addr, shutdown) = spawn_server(100).await;
    let mut stream = TcpStream::connect(addr).await.expect("connect");

    // Two malformed submissions on the same connection.
    for _ in 0..2 {
        stream
            .write_all(&[0x55; RFW_HEADER_LEN])
            .await
            .expect("write garbage");
        let mut reply = [0u8; RFD_HEADER_LEN];
        stream.read_exact(&mut reply).await.expect("read reply");
        assert_eq!(decode_rfd(&reply).expect("decode"), RfdFrame::Nop);
    }

    // Then a valid request, still on the same connection.
    let rfw = Rfw {
        bench_type: "DVD-training".into(),
        wl_metrics: MetricsMask::new(0b1101),
        batch_unit: 10,
        batch_id: 0,
        batch_size: 2,
    };
    let payload = encode_rfw(&rfw, Protocol::Json).expect("encode rfw");
    let header = RfwHeader {
        rfw_id: 42,
        protocol: Protocol::Json,
        payload_len: payload.len() as u64,
    };
    stream.write_all(&header.encode()).await.expect("write header");
    stream.write_all(&payload).await.expect("write payload");

    for expect in 0..2u32 {
        let mut reply = [0u8; RFD_HEADER_LEN];
        stream.read_exact(&mut reply).await.expect("read reply");
        let batch = match decode_rfd(&reply).expect("decode") {
            RfdFrame::Batch(batch) => batch,
            RfdFrame::Nop => panic!("expected a batch after the valid request"),
        };
        assert_eq!(batch.rfw_id, 42);
        assert_eq!(batch.last_batch, expect);

        let mut body = vec![0u8; batch.payload_len as usize];
        stream.read_exact(&mut body).await.expect("read body");
        let decoded = decode_rfd_payload(&body, Protocol::Json).expect("decode body");
        assert_eq!(decoded.keys, vec!["cpu", "net_in", "memory"]);
        assert_eq!(decoded.data.len(), 10);
    }

    // One request per connection: the server closes after the stream.
    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).await.expect("read to end");
    assert!(rest.is_empty());

    shutdown.cancel();
}
