//! Integration tests for `LockBoardCodec` over Tokio streams.
//!
//! A duplex pipe stands in for the serial link. One side plays the host and
//! sends commands through `Framed`; the other side plays the board.

use futures::{SinkExt, StreamExt};
use lockctl_core::{BoardAddress, ChannelId, LockStatus};
use lockctl_protocol::{BoardResponse, Frame, LockBoardCodec, LockCommand};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio_util::codec::Framed;

fn framed_pair(buffer_size: usize) -> (Framed<DuplexStream, LockBoardCodec>, DuplexStream) {
    let (host, board) = tokio::io::duplex(buffer_size);
    (Framed::new(host, LockBoardCodec::new()), board)
}

fn channel(id: u8) -> ChannelId {
    ChannelId::new(id).unwrap()
}

#[tokio::test]
async fn test_command_reaches_board_as_wire_bytes() {
    let (mut host, mut board) = framed_pair(256);

    let cmd = LockCommand::open_single(BoardAddress::new(0), channel(1));
    host.send(cmd).await.unwrap();

    let mut buf = [0u8; 9];
    board.read_exact(&mut buf).await.unwrap();
    assert_eq!(buf, [0x57, 0x4B, 0x4C, 0x59, 0x09, 0x00, 0x82, 0x01, 0x83]);
}

#[tokio::test]
async fn test_response_decoded_from_board() {
    let (mut host, mut board) = framed_pair(256);

    board
        .write_all(&[0x57, 0x4B, 0x4C, 0x59, 0x0B, 0x00, 0x82, 0x00, 0x01, 0x00, 0x81])
        .await
        .unwrap();

    let frame = host.next().await.unwrap().unwrap();
    let response = BoardResponse::parse(&frame).unwrap();
    assert!(matches!(
        response,
        BoardResponse::LockState {
            channel: 1,
            lock_status: LockStatus::Open,
            ..
        }
    ));
}

#[tokio::test]
async fn test_response_split_across_writes() {
    let (mut host, mut board) = framed_pair(256);
    let response = Frame::encode(BoardAddress::new(0), 0x84, &[0x00, 0x03, 0x01, 0x01, 0x00])
        .unwrap();
    let bytes = response.as_bytes().to_vec();

    let writer = tokio::spawn(async move {
        for chunk in bytes.chunks(3) {
            board.write_all(chunk).await.unwrap();
            tokio::task::yield_now().await;
        }
        board
    });

    let frame = host.next().await.unwrap().unwrap();
    assert_eq!(frame, response);
    drop(writer.await.unwrap());
}

#[tokio::test]
async fn test_noise_and_corrupt_frames_skipped() {
    let (mut host, mut board) = framed_pair(1024);

    let mut corrupt = Frame::encode(BoardAddress::new(0), 0x86, &[0x00])
        .unwrap()
        .as_bytes()
        .to_vec();
    let last = corrupt.len() - 1;
    corrupt[last] ^= 0x01;
    let good = Frame::encode(BoardAddress::new(0), 0x85, &[0x04, 0x01]).unwrap();

    board.write_all(&[0xAA, 0xBB, 0xCC]).await.unwrap();
    board.write_all(&corrupt).await.unwrap();
    board.write_all(good.as_bytes()).await.unwrap();

    let frame = host.next().await.unwrap().unwrap();
    assert_eq!(frame, good);
}

#[tokio::test]
async fn test_request_response_exchange() {
    let (mut host, mut board) = framed_pair(256);

    let board_task = tokio::spawn(async move {
        let mut request = [0u8; 8];
        board.read_exact(&mut request).await.unwrap();
        assert_eq!(request[6], 0x84);

        let reply = Frame::encode(BoardAddress::new(0), 0x84, &[0x00, 0x02, 0x00, 0x01]).unwrap();
        board.write_all(reply.as_bytes()).await.unwrap();
        board
    });

    host.send(LockCommand::query_all(BoardAddress::new(0)))
        .await
        .unwrap();
    let frame = host.next().await.unwrap().unwrap();

    let BoardResponse::AllLocks { channels, .. } = BoardResponse::parse(&frame).unwrap() else {
        panic!("expected AllLocks");
    };
    assert_eq!(channels.len(), 2);
    assert!(!channels[0].locked);
    assert!(channels[1].locked);

    drop(board_task.await.unwrap());
}

#[tokio::test]
async fn test_stream_ends_when_board_closes() {
    let (mut host, board) = framed_pair(64);
    drop(board);
    assert!(host.next().await.is_none());
}
