//! Full client/server key agreement: parameter proposal, DH exchange,
//! and reply-key derivation on both sides.

use pkinit::dh::{client_create_exchange, decode_public_value, server_accept_parameters};
use pkinit::kdf::{agility_kdf, octet_string_to_key, principal_name};
use pkinit::Enctype;

#[test]
fn client_and_server_derive_the_same_reply_key() {
    let (mut client, params_der) = client_create_exchange(2048).unwrap();
    let mut server = server_accept_parameters(&params_der, 2048).unwrap();

    client.generate_key_pair().unwrap();
    server.generate_key_pair().unwrap();

    let client_public = decode_public_value(&client.public_value_der().unwrap()).unwrap();
    let server_public = decode_public_value(&server.public_value_der().unwrap()).unwrap();

    client.compute_shared_secret(&server_public).unwrap();
    server.compute_shared_secret(&client_public).unwrap();

    let client_secret = client.shared_secret().unwrap();
    let server_secret = server.shared_secret().unwrap();

    assert_eq!(client_secret, server_secret);
    assert_eq!(client_secret.len(), 2048 / 8);

    let alice = principal_name("EXAMPLE.COM", 1, &["alice"]).unwrap();
    let tgs = principal_name("EXAMPLE.COM", 2, &["krbtgt", "EXAMPLE.COM"]).unwrap();
    let as_req = b"encoded AS-REQ";
    let pk_as_rep = b"encoded PA-PK-AS-REP";

    let client_key = agility_kdf(
        &pkinit::oids::kdf_ah_sha256(),
        client_secret,
        &alice,
        &tgs,
        Enctype::Aes256CtsHmacSha384192,
        as_req,
        pk_as_rep,
    )
    .unwrap();
    let server_key = agility_kdf(
        &pkinit::oids::kdf_ah_sha256(),
        server_secret,
        &alice,
        &tgs,
        Enctype::Aes256CtsHmacSha384192,
        as_req,
        pk_as_rep,
    )
    .unwrap();

    assert_eq!(client_key, server_key);
    assert_eq!(client_key.as_ref().len(), 32);
}

#[test]
fn legacy_derivation_agrees_across_the_exchange() {
    let (mut client, params_der) = client_create_exchange(2048).unwrap();
    let mut server = server_accept_parameters(&params_der, 2048).unwrap();

    client.generate_key_pair().unwrap();
    server.generate_key_pair().unwrap();

    let client_public = decode_public_value(&client.public_value_der().unwrap()).unwrap();
    let server_public = decode_public_value(&server.public_value_der().unwrap()).unwrap();

    client.compute_shared_secret(&server_public).unwrap();
    server.compute_shared_secret(&client_public).unwrap();

    // Both sides append the same nonces to the padded shared secret.
    let nonces = [0x5au8; 32];
    let derive = |secret: &[u8]| {
        let mut input = secret.to_vec();
        input.extend_from_slice(&nonces);
        octet_string_to_key(Enctype::Aes256CtsHmacSha196, &input).unwrap()
    };

    assert_eq!(
        derive(client.shared_secret().unwrap()),
        derive(server.shared_secret().unwrap())
    );
}
