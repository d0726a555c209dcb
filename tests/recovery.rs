//! Fault recovery: reconnect-resume after a dropped stream, and the `NOP`
//! retry budget, driven against scripted servers.

mod common;

use common::{client_config, read_batch_files, row_for};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use workload_relay::protocol::header::{
    RFW_HEADER_LEN, RfdHeader, RfwHeader, encode_nop,
};
use workload_relay::protocol::payload::{RfdPayload, decode_rfw, encode_rfd};
use workload_relay::{Protocol, RequestSpec, Rfw, WorkloadClient};

async fn read_rfw(stream: &mut TcpStream) -> (RfwHeader, Rfw) {
    let mut buf = [0u8; RFW_HEADER_LEN];
    stream.read_exact(&mut buf).await.expect("read rfw header");
    let header = RfwHeader::decode(&buf).expect("decode rfw header");
    let mut payload = vec![0u8; header.payload_len as usize];
    stream.read_exact(&mut payload).await.expect("read rfw payload");
    let rfw = decode_rfw(&payload, header.protocol).expect("decode rfw");
    (header, rfw)
}

async fn send_batch(stream: &mut TcpStream, rfw_id: u32, rfw: &Rfw, index: u32) {
    let start = (rfw.batch_unit * index) as usize;
    let data = (start..start + rfw.batch_unit as usize)
        .map(|i| row_for(i, rfw.wl_metrics))
        .collect();
    let payload = encode_rfd(
        &RfdPayload {
            keys: rfw.wl_metrics.keys().iter().map(|k| k.to_string()).collect(),
            data,
        },
        Protocol::Json,
    )
    .expect("encode rfd");
    let header = RfdHeader {
        rfw_id,
        last_batch: index,
        protocol: Protocol::Json,
        payload_len: payload.len() as u64,
    };
    stream.write_all(&header.encode()).await.expect("write header");
    stream.write_all(&payload).await.expect("write payload");
}

#[tokio::test]
async fn client_resumes_after_a_mid_stream_disconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");

    let script = tokio::spawn(async move {
        // First connection: serve 2 of 5 batches, then drop.
        let (mut stream, _) = listener.accept().await.expect("accept");
        let (header, rfw) = read_rfw(&mut stream).await;
        assert_eq!(rfw.batch_id, 0);
        assert_eq!(rfw.batch_size, 5);
        send_batch(&mut stream, header.rfw_id, &rfw, 0).await;
        send_batch(&mut stream, header.rfw_id, &rfw, 1).await;
        drop(stream);

        // Second connection: the adjusted request resumes where the
        // first stream left off.
        let (mut stream, _) = listener.accept().await.expect("accept");
        let (header, resumed) = read_rfw(&mut stream).await;
        assert_eq!(resumed.batch_id, 2);
        assert_eq!(resumed.batch_size, 3);
        assert_eq!(resumed.bench_type, rfw.bench_type);
        for index in 2..5 {
            send_batch(&mut stream, header.rfw_id, &resumed, index).await;
        }
    });

    let dir = tempfile::tempdir().expect("tempdir");
    let client = WorkloadClient::new(client_config(addr, dir.path()));
    let summary = client
        .run(
            vec![RequestSpec::single("JSON", "DVD-training", 0b1101, 10, 0, 5)],
            CancellationToken::new(),
        )
        .await
        .expect("client run");

    assert_eq!(summary.completed, 1);
    assert_eq!(summary.files_written, 5);

    // The concatenated output is identical to an uninterrupted run.
    let files = read_batch_files(dir.path());
    assert_eq!(
        files.iter().map(|(id, _)| *id).collect::<Vec<_>>(),
        vec![0, 1, 2, 3, 4]
    );
    for (batch_id, contents) in &files {
        let first_row = contents.lines().nth(1).expect("first data row");
        let first = (batch_id * 10) as i64;
        assert_eq!(
            first_row,
            format!("{},{},{}", first, 1000 + first, first as f64 / 2.0)
        );
    }

    script.await.expect("script server");
}

async fn run_nop_script(nops: u32) -> workload_relay::RunSummary {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");

    let script = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("accept");
        // Each NOP makes the client resend on the same connection.
        for _ in 0..nops {
            let _ = read_rfw(&mut stream).await;
            stream.write_all(&encode_nop()).await.expect("write nop");
        }
        // If the client still has budget it resends once more; serve it.
        let mut buf = [0u8; RFW_HEADER_LEN];
        if stream.read_exact(&mut buf).await.is_ok() {
            let header = RfwHeader::decode(&buf).expect("decode");
            let mut payload = vec![0u8; header.payload_len as usize];
            stream.read_exact(&mut payload).await.expect("payload");
            let rfw = decode_rfw(&payload, header.protocol).expect("rfw");
            for index in rfw.batch_id..rfw.batch_id + rfw.batch_size {
                send_batch(&mut stream, header.rfw_id, &rfw, index).await;
            }
        }
    });

    let dir = tempfile::tempdir().expect("tempdir");
    let client = WorkloadClient::new(client_config(addr, dir.path()));
    let summary = client
        .run(
            vec![RequestSpec::single("JSON", "DVD-training", 0b1101, 10, 0, 2)],
            CancellationToken::new(),
        )
        .await
        .expect("client run");

    script.abort();
    summary
}

#[tokio::test]
async fn four_nops_still_complete() {
    let summary = run_nop_script(4).await;
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.files_written, 2);
}

#[tokio::test]
async fn five_nops_exhaust_the_retry_budget() {
    let summary = run_nop_script(5).await;
    assert_eq!(summary.completed, 0);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.files_written, 0);
}
