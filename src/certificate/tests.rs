use crate::certificate::{
    load_certificates, resolve_certificate_path, CertificateError, CertificateKind,
    TrustedCertificate,
};

use std::path::{Path, PathBuf};

// Self-signed certificate wrapping the public half of `crate::jwt::tests::TEST_RSA_PRIV_KEY`.
pub const TEST_RSA_CERT: &str = "-----BEGIN CERTIFICATE-----\n\
    MIIDDjCCAfagAwIBAgIBATANBgkqhkiG9w0BAQsFADAfMR0wGwYDVQQDDBRhY2Nv\n\
    dW50cy5leGFtcGxlLmNvbTAgFw0yNjEwMTkxOTQwNTFaGA8yMTI2MDkyNTE5NDA1\n\
    MVowHzEdMBsGA1UEAwwUYWNjb3VudHMuZXhhbXBsZS5jb20wggEiMA0GCSqGSIb3\n\
    DQEBAQUAA4IBDwAwggEKAoIBAQCfgQ+0A4Jz0CWR5Ac/MdK2ABuCzttNkvBQFl1H\n\
    z8q4o8Qct3isdVN5P475dXaNGiN02HElZMO813uepDRUSJlAfP8AmZIKkxokxEFI\n\
    UqspvbCpXAZT82xg5gv5C2JY3aVvNwR7pcLR0CmvnJ1AuseqQceKDdEGit1pnoCP\n\
    6gEeoUQdik97tOl7459V8d3UTpxLozUVlwPU00tgPmUUek8j1tPAmWx17e6EaoLR\n\
    kK4QeDyWHPA4eu0hBtLQVVtv2Tf61VNTh+D/cv++eJQUArC4IuoqdLYFjB2r+bNK\n\
    dstjuH+qLGhHuOKDf/+RGG5rHBSRHPmJqJCSqBzmAd2s0/nPAgMBAAGjUzBRMB0G\n\
    A1UdDgQWBBTDgwKdvAPqbbCmehDaw0PwavI83jAfBgNVHSMEGDAWgBTDgwKdvAPq\n\
    bbCmehDaw0PwavI83jAPBgNVHRMBAf8EBTADAQH/MA0GCSqGSIb3DQEBCwUAA4IB\n\
    AQBKw48ShMQPvOFnbcoS31kRovblcU+ziHjm50cd+utq4ugBJ2wC605+D5Z2LXcP\n\
    VYm9zKof10Hd2gQZ1XkXphtFqY9uC1kITrSVUWFnHSSHrbIfWt4WZ+jjZ3g4XZif\n\
    eHmgV4ANl9K24IGobFRyJMawwt48gwrKdSWljUZLuNKApz+SDONJ4X5KMj9XZ1o7\n\
    tEaXoJqSwmTcRoAYRqSphNp9mYEpQpGF5Lbgnrx0zEXTXUy+KgPRNKlrtWW/M/1u\n\
    +rovm2NeNSgsD16pbykhJzHPfumwJlag7o1G/uuxTbk03Oi5aPQiZ7eG8Gi6Gb3X\n\
    kQ3/RvRXWuc5uXp7KWgkj7bD\n\
    -----END CERTIFICATE-----\n";

pub const TEST_OTHER_RSA_CERT: &str = "-----BEGIN CERTIFICATE-----\n\
    MIIDCDCCAfCgAwIBAgIBAjANBgkqhkiG9w0BAQsFADAcMRowGAYDVQQDDBFvdGhl\n\
    ci5leGFtcGxlLmNvbTAgFw0yNjEwMTkxOTQwNThaGA8yMTI2MDkyNTE5NDA1OFow\n\
    HDEaMBgGA1UEAwwRb3RoZXIuZXhhbXBsZS5jb20wggEiMA0GCSqGSIb3DQEBAQUA\n\
    A4IBDwAwggEKAoIBAQDbLmYRmLfowiOfngLR62GJmK6TsPgQC7TUjvFyyI3Ca4Yh\n\
    XrvThiC0ed7u3yMhOJ/Y+T1Z5lAR0KevzXLZv76biZafxKL6eh7nWRvASXHXGzj9\n\
    8/39r0xjQHQV7CTz1ChXL9An6yRsrLuXMkvDAwlIgrsssuMfjDbRETzBHtlTdH3w\n\
    249e47vjU/dRRBdXFVEFG5LDyVDkdj1qMMDuIxEdrXwYEkNYpWyGG/PpV9QU765m\n\
    4n6S6Nyg89dW67OZWlMPmrV6JW2TUOF2oT9iGSD6rF2FagSLS+H+2GkYGf8VZzAB\n\
    WPZLR0dfEuzf4wzOeuYft/2VIdVYBW5dDDRZ18zXAgMBAAGjUzBRMB0GA1UdDgQW\n\
    BBQNaSIIlK/YnhFohjAH56HskSsaFDAfBgNVHSMEGDAWgBQNaSIIlK/YnhFohjAH\n\
    56HskSsaFDAPBgNVHRMBAf8EBTADAQH/MA0GCSqGSIb3DQEBCwUAA4IBAQBJ8bcI\n\
    KM1+POJB50Gmn/HEo02XIVv1ozRVLZqn0xIF3zWXG2vB/8LNxQYI6kZWvU/+bJJi\n\
    RPUf7pSMVEZ5mv6oiJ1GgevAFIfufHydk0xPXmRRwTRTKLCqGY3Wwr/UMGEslYo4\n\
    LZvn/NVbYouWwTDDMO38Z8nH5catsu2fcYv7RTsnlJPsEDhoY0fDXhjCGzczxAGM\n\
    XliWKG+RRgI5JE6L4W6N9tLyi44ky+eESUE8570HfstZt+Tt4vfwPw97kBvRFhAV\n\
    4Ve5XSVSnvoOWhGPNfBosAKrGjxqQhGCoivuQyn3ftXRa0lD1nfm9Lzsthn48N4I\n\
    p1eurv8GJcvfyzhM\n\
    -----END CERTIFICATE-----\n";

pub const TEST_RSA_PUB_KEY: &str = "-----BEGIN PUBLIC KEY-----\n\
    MIIBIjANBgkqhkiG9w0BAQEFAAOCAQ8AMIIBCgKCAQEAn4EPtAOCc9AlkeQHPzHS\n\
    tgAbgs7bTZLwUBZdR8/KuKPEHLd4rHVTeT+O+XV2jRojdNhxJWTDvNd7nqQ0VEiZ\n\
    QHz/AJmSCpMaJMRBSFKrKb2wqVwGU/NsYOYL+QtiWN2lbzcEe6XC0dApr5ydQLrH\n\
    qkHHig3RBordaZ6Aj+oBHqFEHYpPe7Tpe+OfVfHd1E6cS6M1FZcD1NNLYD5lFHpP\n\
    I9bTwJlsde3uhGqC0ZCuEHg8lhzwOHrtIQbS0FVbb9k3+tVTU4fg/3L/vniUFAKw\n\
    uCLqKnS2BYwdq/mzSnbLY7h/qixoR7jig3//kRhuaxwUkRz5iaiQkqgc5gHdrNP5\n\
    zwIDAQAB\n\
    -----END PUBLIC KEY-----\n";

pub const TEST_RSA_PKCS1_PUB_KEY: &str = "-----BEGIN RSA PUBLIC KEY-----\n\
    MIIBCgKCAQEAn4EPtAOCc9AlkeQHPzHStgAbgs7bTZLwUBZdR8/KuKPEHLd4rHVT\n\
    eT+O+XV2jRojdNhxJWTDvNd7nqQ0VEiZQHz/AJmSCpMaJMRBSFKrKb2wqVwGU/Ns\n\
    YOYL+QtiWN2lbzcEe6XC0dApr5ydQLrHqkHHig3RBordaZ6Aj+oBHqFEHYpPe7Tp\n\
    e+OfVfHd1E6cS6M1FZcD1NNLYD5lFHpPI9bTwJlsde3uhGqC0ZCuEHg8lhzwOHrt\n\
    IQbS0FVbb9k3+tVTU4fg/3L/vniUFAKwuCLqKnS2BYwdq/mzSnbLY7h/qixoR7ji\n\
    g3//kRhuaxwUkRz5iaiQkqgc5gHdrNP5zwIDAQAB\n\
    -----END RSA PUBLIC KEY-----\n";

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("oidc-strategy-{}-{}", name, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn test_parse_x509_certificate() {
    let certificates = TrustedCertificate::from_pem("inline", TEST_RSA_CERT).unwrap();
    assert_eq!(certificates.len(), 1);
    assert_eq!(certificates[0].kind(), CertificateKind::X509);
    assert_eq!(certificates[0].source(), "inline");
    assert_eq!(certificates[0].pem().trim_end(), TEST_RSA_CERT.trim_end());

    // The SPKI extracted from the certificate is the same key as the bare public key.
    let public_key = TrustedCertificate::from_pem("inline", TEST_RSA_PUB_KEY).unwrap();
    assert_eq!(public_key[0].kind(), CertificateKind::PublicKey);
    assert_eq!(
        certificates[0].public_key_der(),
        public_key[0].public_key_der()
    );
}

#[test]
fn test_parse_skips_unrelated_sections() {
    match TrustedCertificate::from_pem("pkcs1", TEST_RSA_PKCS1_PUB_KEY) {
        Err(CertificateError::Empty(source)) => assert_eq!(source, "pkcs1"),
        other => panic!("unexpected result: {:?}", other),
    }

    let mixed = format!("{}{}", TEST_RSA_PKCS1_PUB_KEY, TEST_RSA_PUB_KEY);
    let certificates = TrustedCertificate::from_pem("mixed", &mixed).unwrap();
    assert_eq!(certificates.len(), 1);
    assert_eq!(certificates[0].kind(), CertificateKind::PublicKey);
    assert_eq!(certificates[0].pem().trim_end(), TEST_RSA_PUB_KEY.trim_end());
}

#[test]
fn test_parse_bundle() {
    let bundle = format!("# bundle\n{}\n{}", TEST_RSA_CERT, TEST_OTHER_RSA_CERT);
    let certificates = TrustedCertificate::from_pem("bundle", &bundle).unwrap();
    assert_eq!(certificates.len(), 2);
    assert_ne!(
        certificates[0].public_key_der(),
        certificates[1].public_key_der()
    );
}

#[test]
fn test_parse_errors() {
    match TrustedCertificate::from_pem("empty", "not a pem file") {
        Err(CertificateError::Empty(source)) => assert_eq!(source, "empty"),
        other => panic!("unexpected result: {:?}", other),
    }

    match TrustedCertificate::from_pem(
        "truncated",
        "-----BEGIN CERTIFICATE-----\n\
         MIIDDjCCAfagAwIBAgIBATANBgkqhkiG9w0BAQsFADAfMR0wGwYDVQQDDBRhY2Nv\n",
    ) {
        Err(CertificateError::Pem(_)) => {}
        other => panic!("unexpected result: {:?}", other),
    }

    let private_key = crate::jwt::tests::TEST_RSA_PRIV_KEY;
    match TrustedCertificate::from_pem("private", private_key) {
        Err(CertificateError::UnsupportedLabel(label)) => assert_eq!(label, "RSA PRIVATE KEY"),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_debug_omits_key_material() {
    let certificates = TrustedCertificate::from_pem("inline", TEST_RSA_CERT).unwrap();
    let debug = format!("{:?}", certificates[0]);
    assert!(debug.contains("inline"));
    assert!(!debug.contains("MIID"));
}

#[test]
fn test_resolve_certificate_path() {
    let root = Path::new("/srv/app");
    assert_eq!(
        resolve_certificate_path(root, "/certs/provider.pem"),
        PathBuf::from("/srv/app/certs/provider.pem")
    );
    assert_eq!(
        resolve_certificate_path(root, "certs/provider.pem"),
        PathBuf::from("/srv/app/certs/provider.pem")
    );
}

#[test]
fn test_load_certificates() {
    let root = scratch_dir("load");
    std::fs::create_dir_all(root.join("certs")).unwrap();
    std::fs::write(root.join("certs/a.pem"), TEST_RSA_CERT).unwrap();
    std::fs::write(
        root.join("certs/b.pem"),
        format!("{}{}", TEST_OTHER_RSA_CERT, TEST_RSA_PUB_KEY),
    )
    .unwrap();

    let certificates = load_certificates(&root, &["/certs/a.pem", "/certs/b.pem"]).unwrap();
    assert_eq!(certificates.len(), 3);
    assert!(certificates[0].source().ends_with("a.pem"));

    match load_certificates(&root, &["/certs/missing.pem"]) {
        Err(CertificateError::Io { path, .. }) => assert!(path.ends_with("certs/missing.pem")),
        other => panic!("unexpected result: {:?}", other),
    }

    std::fs::remove_dir_all(&root).unwrap();
}
