//! End-to-end flows through broker, orchestrators, and the direct channel:
//! the two scenarios the product actually ships.

mod common;

use std::sync::{Arc, Mutex};

use common::{client_for, spawn_broker};
use crlink::desktop::{OutgoingDocument, PdfSender, PhotoInbox, PhotoSink, ReceivedPhoto, SendState};
use crlink::invite::{Invite, PairMode};
use crlink::mobile::{self, PhotoShutter};

/// Synthetic multi-megabyte "report": deterministic and not valid UTF-8.
fn synthetic_pdf(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

#[tokio::test]
async fn report_reaches_the_phone_byte_for_byte() {
    let broker = spawn_broker().await;
    let client = client_for(broker);

    let original = synthetic_pdf(2 * 1024 * 1024);
    let sender = PdfSender::open(
        &client,
        OutgoingDocument {
            bytes: original.clone(),
            filename: "CR_Doe.pdf".to_string(),
            patient_label: "Jean Doe".to_string(),
        },
    )
    .await
    .unwrap();

    // the phone only ever sees the invitation URL, exactly as scanned
    let url = sender.invite().to_url("https://cr-chirurgie.local/");
    let invite = Invite::parse(&url).unwrap();
    assert_eq!(invite.mode(), PairMode::Pdf);

    let phone_flow = async {
        let channel = mobile::connect(&client, &invite).await.unwrap();
        let document = mobile::receive_document(&channel).await;
        // keep the phone side open so the desktop channel stays undisturbed
        (document, channel)
    };
    let (served, (received, phone_channel)) = tokio::join!(sender.serve(), phone_flow);

    let desktop_channel = served.unwrap();
    let document = received.unwrap();

    assert_eq!(document.filename, "CR_Doe.pdf");
    assert_eq!(document.patient_label, "Jean Doe");
    assert_eq!(document.bytes.len(), original.len());
    assert_eq!(document.bytes, original);

    // a successful send leaves the channel open until the dialog is dismissed
    assert_eq!(*sender.state().borrow(), SendState::Sent);
    assert_eq!(
        desktop_channel.state(),
        crlink::pairing::ChannelState::Open
    );

    // saving on the phone side, as the share/download affordance would
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(&document.filename);
    std::fs::write(&path, &document.bytes).unwrap();
    assert_eq!(std::fs::metadata(&path).unwrap().len() as usize, original.len());

    phone_channel.close();
    desktop_channel.close();
    sender.close().await;
}

#[tokio::test]
async fn three_rapid_captures_all_land_in_order() {
    let broker = spawn_broker().await;
    let client = client_for(broker);

    let photos: Arc<Mutex<Vec<ReceivedPhoto>>> = Arc::new(Mutex::new(Vec::new()));
    let sink: PhotoSink = {
        let photos = Arc::clone(&photos);
        Arc::new(move |photo| photos.lock().unwrap().push(photo))
    };

    let inbox = PhotoInbox::open(&client, sink).await.unwrap();
    let invite = Invite::parse(&inbox.invite().to_url("https://cr-chirurgie.local/")).unwrap();
    assert_eq!(invite.mode(), PairMode::Photo);

    let phone_flow = async {
        let channel = mobile::connect(&client, &invite).await.unwrap();
        let shutter = PhotoShutter::new(channel);
        // back-to-back, no awaits between shutter presses
        for n in 0..3u8 {
            let jpeg = vec![n; 1000 + n as usize];
            shutter.send_photo(&jpeg).unwrap();
        }
        assert_eq!(shutter.photos_sent(), 3);
        shutter.close();
    };

    let (served, ()) = tokio::join!(inbox.serve_once(), phone_flow);
    assert_eq!(served.unwrap(), 3, "one connection delivered three photos");

    {
        let photos = photos.lock().unwrap();
        assert_eq!(photos.len(), 3);
        for (slot, photo) in photos.iter().enumerate() {
            let n = slot as u8;
            assert_eq!(photo.index, slot + 1, "photos numbered in capture order");
            assert_eq!(photo.bytes, vec![n; 1000 + n as usize], "capture decoded intact");
        }
    }
    assert_eq!(inbox.received(), 3);
    inbox.close().await;
}

#[tokio::test]
async fn a_second_scan_reuses_the_same_invitation() {
    let broker = spawn_broker().await;
    let client = client_for(broker);

    let photos: Arc<Mutex<Vec<ReceivedPhoto>>> = Arc::new(Mutex::new(Vec::new()));
    let sink: PhotoSink = {
        let photos = Arc::clone(&photos);
        Arc::new(move |photo| photos.lock().unwrap().push(photo))
    };

    let inbox = PhotoInbox::open(&client, sink).await.unwrap();
    let invite = inbox.invite();

    for round in 0..2u8 {
        let phone_flow = async {
            let channel = mobile::connect(&client, &invite).await.unwrap();
            let shutter = PhotoShutter::new(channel);
            shutter.send_photo(&[round; 64]).unwrap();
            shutter.close();
        };
        let (served, ()) = tokio::join!(inbox.serve_once(), phone_flow);
        assert_eq!(served.unwrap(), 1);
    }

    let photos = photos.lock().unwrap();
    assert_eq!(photos.len(), 2);
    // numbering continues across reconnects
    assert_eq!(photos[0].index, 1);
    assert_eq!(photos[1].index, 2);
    assert_eq!(inbox.received(), 2);
}
