use benchmark_simple::*;
use jose_hpke::prelude::*;

fn main() {
    let bench = Bench::new();

    let options = &Options {
        iterations: 1000,
        warmup_iterations: 100,
        min_samples: 5,
        max_samples: 10,
        max_rsd: 1.0,
        ..Default::default()
    };

    let plaintext = vec![0x42u8; 1024];

    for alg in ["HPKE-8", "HPKE-10-KE", "HPKE-12", "HPKE-14-KE", "HPKE-16"] {
        let sk = HPKEDecryptionKey::derive(alg).unwrap();
        let pk = sk.encryption_key();

        let token = pk.encrypt_compact(&plaintext).unwrap();
        let pt = plaintext.clone();
        let res = bench.run(options, move || pk.encrypt_compact(&pt).unwrap());
        println!("{} - encrypt: {}", alg, res.throughput(1));

        let res = bench.run(options, move || sk.decrypt_compact(&token, None).unwrap());
        println!("{} - decrypt: {}", alg, res.throughput(1));
    }
}
