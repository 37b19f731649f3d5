//! Prints the kong-sync CRDs as a multi-document YAML stream.
//!
//! Usage: `cargo run -p crds --bin crdgen | kubectl apply -f -`

use crds::{ApiPlugin, GatewayApi};
use kube::CustomResourceExt;

fn main() -> Result<(), serde_yaml::Error> {
    for crd in [GatewayApi::crd(), ApiPlugin::crd()] {
        print!("---\n{}", serde_yaml::to_string(&crd)?);
    }
    Ok(())
}
